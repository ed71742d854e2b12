//! Replay a JSONL trade log through a fresh learning context.
//!
//! Usage: replay_trades <trades.jsonl>
//! Env: EXPORT_PATH writes the final context snapshot; SEED fixes the rng;
//! DECAY_EVERY runs a decay tick after every N trades.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use tradelearn::config::Config;
use tradelearn::context::LearningContext;
use tradelearn::logging::{log, obj, run_id, v_num, v_str, Domain, Level};
use tradelearn::replay::{load_trades, Replayer};

fn main() -> Result<()> {
    let path = match std::env::args().nth(1) {
        Some(p) => PathBuf::from(p),
        None => bail!("usage: replay_trades <trades.jsonl>"),
    };

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    let mut ctx = match std::env::var("SEED").ok().and_then(|v| v.parse().ok()) {
        Some(seed) => LearningContext::seeded(config, seed),
        None => LearningContext::new(config),
    };
    let decay_every: usize = std::env::var("DECAY_EVERY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let trades = load_trades(&path)?;
    log(
        Level::Info,
        Domain::System,
        "replay_start",
        obj(&[
            ("run_id", v_str(run_id())),
            ("trades", v_num(trades.len() as f64)),
        ]),
    );

    let mut replayer = Replayer::new();
    for (i, trade) in trades.iter().enumerate() {
        replayer.feed(&mut ctx, trade);
        if decay_every > 0 && (i + 1) % decay_every == 0 {
            ctx.decay_tick();
        }
    }
    let report = replayer.report();

    eprintln!(
        "[REPLAY] trades={} accepted={} skipped={} regime_shifts={}",
        report.trades, report.accepted, report.skipped, report.regime_shifts
    );
    println!("{}", serde_json::to_string_pretty(&ctx.summary())?);
    println!("{}", serde_json::to_string_pretty(&ctx.health())?);

    if let Ok(out) = std::env::var("EXPORT_PATH") {
        let snapshot = ctx.export();
        std::fs::write(&out, serde_json::to_string_pretty(&snapshot)?)
            .with_context(|| format!("write export to {}", out))?;
        eprintln!("[EXPORT] {} fingerprint={}", out, snapshot.fingerprint);
    }
    Ok(())
}
