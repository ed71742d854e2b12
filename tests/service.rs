//! Integration tests: the learning actor serializes concurrent callers.

use tradelearn::config::Config;
use tradelearn::context::LearningContext;
use tradelearn::error::LearningError;
use tradelearn::memory::SamplingStrategy;
use tradelearn::regime::Regime;
use tradelearn::service::{LearningService, DEFAULT_QUEUE};
use tradelearn::snapshot::{StateSnapshot, TradeAction, TradeResult};

fn trade(ts: u64, profit: f64) -> TradeResult {
    let mut s = StateSnapshot::default();
    s.timestamp = ts;
    s.market.regime = "STABLE".to_string();
    s.market.liquidity = 60.0;
    s.fusion.confidence = 55.0;
    TradeResult::new("ETHUSDT", TradeAction::Buy, profit, profit / 100.0, s)
}

#[tokio::test]
async fn test_concurrent_training_is_serialized() {
    let (handle, task) = LearningService::spawn(LearningContext::seeded(Config::default(), 1), 8);

    let mut joins = Vec::new();
    for worker in 0..4u64 {
        let h = handle.clone();
        joins.push(tokio::spawn(async move {
            for i in 0..25u64 {
                let profit = if i % 3 == 0 { -50.0 } else { 120.0 };
                h.train_on_closed_trade(trade(worker * 1000 + i, profit))
                    .await
                    .unwrap();
            }
        }));
    }
    for j in joins {
        j.await.unwrap();
    }

    let summary = handle.summary().await.unwrap();
    assert_eq!(summary.stats.trades_trained, 100);
    assert_eq!(summary.memory_entries, 100);

    drop(handle);
    let ctx = task.await.unwrap();
    assert_eq!(ctx.memory().len(), 100);
    assert_eq!(ctx.adaptation().statistics().trades_trained, 100);
}

#[tokio::test]
async fn test_export_import_through_handles() {
    let (a, _task_a) = LearningService::spawn(LearningContext::seeded(Config::default(), 2), DEFAULT_QUEUE);
    let (b, _task_b) = LearningService::spawn(LearningContext::seeded(Config::default(), 3), DEFAULT_QUEUE);

    for ts in 0..5 {
        a.train_on_closed_trade(trade(ts, 80.0)).await.unwrap();
    }
    a.train_on_regime_shift("STABLE", "BREAKOUT", true).await.unwrap();
    let snapshot = a.export().await.unwrap();

    b.import(snapshot.clone()).await.unwrap();
    let summary = b.summary().await.unwrap();
    assert_eq!(summary.regime, Regime::Breakout);
    assert_eq!(summary.memory_entries, 5);
    assert_eq!(b.export().await.unwrap().fingerprint, snapshot.fingerprint);

    let mut broken = snapshot;
    broken.fingerprint = "00".repeat(32);
    match b.import(broken).await {
        Err(LearningError::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_observe_sample_and_decay() {
    let (handle, _task) = LearningService::spawn(LearningContext::seeded(Config::default(), 4), DEFAULT_QUEUE);
    for ts in 0..30u64 {
        let mut s = StateSnapshot::default();
        s.timestamp = ts;
        s.engine.threat_level = 90.0;
        let obs = handle.observe_snapshot(s).await.unwrap();
        assert_eq!(obs.importance, 100.0);
    }
    assert_eq!(handle.sample(10, SamplingStrategy::Random).await.unwrap().len(), 10);
    let report = handle.decay_tick().await.unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(report.remaining, 30);

    let health = handle.health().await.unwrap();
    assert!(!health.issues.is_empty());
    let _ = handle.mutate_weights().await.unwrap();
}

#[tokio::test]
async fn test_stopped_service_reports_error() {
    let (handle, task) = LearningService::spawn(LearningContext::seeded(Config::default(), 5), 1);
    task.abort();
    let _ = task.await;
    match handle.summary().await {
        Err(LearningError::ServiceStopped) => {}
        other => panic!("expected ServiceStopped, got {:?}", other),
    }
}
