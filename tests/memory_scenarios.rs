//! Integration tests: experience store capacity, eviction and compression.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tradelearn::config::MemoryConfig;
use tradelearn::memory::{HealthStatus, MemoryStore, Priority, SamplingStrategy};
use tradelearn::snapshot::{StateSnapshot, TradeOutcome};

fn snap(ts: u64) -> StateSnapshot {
    StateSnapshot {
        timestamp: ts,
        ..Default::default()
    }
}

fn store(max_size: usize) -> MemoryStore {
    MemoryStore::new(MemoryConfig {
        max_size,
        compression_threshold: 1500,
    })
}

/// 600 pushes into a 500-slot store: the 100 oldest low-importance
/// entries go, everything else stays.
#[test]
fn test_overflow_evicts_lowest_importance_unreviewed() {
    let mut m = store(500);
    for ts in 0..600 {
        let priority = if ts % 5 == 0 { Priority::Low } else { Priority::Medium };
        m.push(snap(ts), priority);
        assert!(m.len() <= 500);
    }

    assert_eq!(m.len(), 500);
    assert_eq!(m.counters().total_evicted, 100);

    let low: Vec<u64> = m
        .by_priority(Priority::Low)
        .iter()
        .map(|e| e.state.timestamp)
        .collect();
    assert_eq!(low, (500..600).step_by(5).collect::<Vec<u64>>());
    assert_eq!(m.by_priority(Priority::Medium).len(), 480);
}

#[test]
fn test_reviewed_entries_survive_eviction() {
    let mut m = store(500);
    for ts in 0..500 {
        m.push(snap(ts), Priority::Low);
    }
    m.mark_as_reviewed(0);
    m.push(snap(500), Priority::High);

    assert_eq!(m.len(), 500);
    let first = m.entries().next().map(|e| e.state.timestamp);
    // ts 0 is reviewed, so the oldest unreviewed (ts 1) is the victim
    assert_eq!(first, Some(0));
    assert!(m.entries().all(|e| e.state.timestamp != 1));
}

/// Shrink request below the floor is clamped; an explicit repack keeps only
/// the top entries in original order.
#[test]
fn test_shrink_and_compress_keeps_top_entries() {
    let mut m = store(500);
    for ts in 0..500 {
        let priority = match ts % 10 {
            0 => Priority::Critical,
            1 | 2 => Priority::High,
            _ => Priority::Low,
        };
        m.push(snap(ts), priority);
    }

    assert_eq!(m.set_max_size(100), 500);
    assert_eq!(m.len(), 500);

    let removed = m.compress_to(100);
    assert_eq!(removed, 400);
    assert_eq!(m.len(), 100);
    assert_eq!(m.by_priority(Priority::Critical).len(), 50);
    assert_eq!(m.by_priority(Priority::High).len(), 50);
    assert!(m.entries().all(|e| e.importance >= 90.0));

    let ts: Vec<u64> = m.entries().map(|e| e.state.timestamp).collect();
    let mut sorted = ts.clone();
    sorted.sort_unstable();
    assert_eq!(ts, sorted);

    // highs are kept earliest first
    let last_high = m
        .by_priority(Priority::High)
        .last()
        .map(|e| e.state.timestamp);
    assert_eq!(last_high, Some(242));
}

/// A full 2000-slot store asked to shrink to 100 lands on the 500 floor
/// and keeps the 500 most important entries in store order.
#[test]
fn test_shrink_request_from_full_store_keeps_top_500() {
    let mut m = store(2000);
    for ts in 0..2000u64 {
        let priority = match ts % 8 {
            0 => Priority::Critical,
            1 | 2 => Priority::High,
            3 | 4 => Priority::Medium,
            _ => Priority::Low,
        };
        m.push(snap(ts), priority);
    }
    assert_eq!(m.len(), 2000);

    let mut ranked: Vec<(f64, u64)> = m.entries().map(|e| (e.importance, e.state.timestamp)).collect();
    // stable sort: ties keep the earlier entry
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    let cutoff = ranked[499].0;
    let mut expected: Vec<u64> = ranked[..500].iter().map(|&(_, ts)| ts).collect();
    expected.sort_unstable();

    assert_eq!(m.set_max_size(100), 500);
    assert_eq!(m.max_size(), 500);
    assert_eq!(m.len(), 500);
    assert!(m.entries().all(|e| e.importance >= cutoff));

    let kept: Vec<u64> = m.entries().map(|e| e.state.timestamp).collect();
    assert_eq!(kept, expected);
    assert_eq!(m.by_priority(Priority::Critical).len(), 250);
    assert_eq!(m.by_priority(Priority::High).len(), 250);
}

#[test]
fn test_compression_is_idempotent() {
    let mut m = store(500);
    for ts in 0..300 {
        m.push(snap(ts), if ts % 2 == 0 { Priority::High } else { Priority::Low });
    }
    m.decay_importance(0.5);
    let first = m.compress_memory();
    assert_eq!(first, 150);
    let kept: Vec<u64> = m.entries().map(|e| e.state.timestamp).collect();
    assert_eq!(m.compress_memory(), 0);
    assert_eq!(m.entries().map(|e| e.state.timestamp).collect::<Vec<_>>(), kept);
}

#[test]
fn test_size_invariant_under_random_load() {
    let mut rng = StdRng::seed_from_u64(17);
    let mut m = store(500);
    for ts in 0..3000u64 {
        let priority = Priority::ALL[rng.gen_range(0..4)];
        let mut s = snap(ts);
        s.engine.threat_level = rng.gen_range(0.0..100.0);
        if rng.gen_bool(0.3) {
            s.outcome = Some(TradeOutcome {
                profit: 1.0,
                profit_pct: rng.gen_range(-10.0..10.0),
                duration_ms: 1_000,
                success: rng.gen_bool(0.5),
            });
        }
        m.push(s, priority);
        if rng.gen_bool(0.05) {
            m.mark_as_reviewed(ts);
        }
        assert!(m.len() <= m.max_size());
        assert!(m.entries().all(|e| (0.0..=100.0).contains(&e.importance)));
    }
    assert_eq!(m.counters().total_pushed, 3000);
    assert_eq!(m.counters().total_evicted, 2500);
}

#[test]
fn test_sampling_over_mixed_store() {
    let mut m = store(500);
    for ts in 0..100u64 {
        let s = snap(ts).with_outcome(TradeOutcome {
            profit: if ts % 4 == 0 { 1.0 } else { -1.0 },
            profit_pct: 1.0,
            duration_ms: 0,
            success: ts % 4 == 0,
        });
        m.push(s, Priority::Medium);
    }
    let mut rng = StdRng::seed_from_u64(1);
    let balanced = m.sample(20, SamplingStrategy::Balanced, &mut rng);
    let wins = balanced.iter().filter(|e| e.state.is_success() == Some(true)).count();
    assert_eq!(wins, 10);
    assert_eq!(balanced.len(), 20);

    assert_eq!(m.sample(20, SamplingStrategy::Prioritized, &mut rng).len(), 20);
    assert_eq!(m.sample(200, SamplingStrategy::Random, &mut rng).len(), 100);
}

#[test]
fn test_health_degrades_as_store_fills() {
    let mut m = store(500);
    assert_eq!(m.memory_health().status, HealthStatus::Healthy);
    for ts in 0..450u64 {
        let s = snap(ts).with_outcome(TradeOutcome {
            profit: 1.0,
            profit_pct: 1.0,
            duration_ms: 0,
            success: ts % 2 == 0,
        });
        m.push(s, Priority::Low);
    }
    m.mark_all_reviewed();
    let h = m.memory_health();
    assert_eq!(h.status, HealthStatus::Warning);
    assert!((h.utilization_pct - 90.0).abs() < 1e-9);
}

#[test]
fn test_export_import_preserves_counters() {
    let mut m = store(500);
    for ts in 0..520 {
        m.push(snap(ts), Priority::Low);
    }
    let snapshot = m.export();
    let json = serde_json::to_string(&snapshot).unwrap();

    let mut other = MemoryStore::default();
    other
        .import(serde_json::from_str(&json).unwrap())
        .unwrap();
    assert_eq!(other.len(), 500);
    assert_eq!(other.max_size(), 500);
    assert_eq!(other.counters(), m.counters());
}
