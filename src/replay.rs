//! JSONL trade-log loading for offline replay.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::context::LearningContext;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::snapshot::TradeResult;

/// One `TradeResult` per line; blank lines and `#` comments are skipped.
pub fn read_trades<R: BufRead>(reader: R) -> Result<Vec<TradeResult>> {
    let mut trades = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trade: TradeResult = serde_json::from_str(trimmed)
            .with_context(|| format!("parse trade on line {}", idx + 1))?;
        trades.push(trade);
    }
    Ok(trades)
}

pub fn load_trades(path: &Path) -> Result<Vec<TradeResult>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let trades = read_trades(BufReader::new(file))?;
    log(
        Level::Info,
        Domain::System,
        "trades_loaded",
        obj(&[
            ("path", v_str(&path.display().to_string())),
            ("count", v_num(trades.len() as f64)),
        ]),
    );
    Ok(trades)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayReport {
    pub trades: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub regime_shifts: usize,
}

/// Feeds trades through a context in order. A change in the entry-state
/// regime label between consecutive trades is replayed as a regime shift,
/// judged successful when the first trade in the new regime is profitable.
#[derive(Debug, Default)]
pub struct Replayer {
    report: ReplayReport,
    last_regime: Option<String>,
}

impl Replayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> ReplayReport {
        self.report
    }

    pub fn feed(&mut self, ctx: &mut LearningContext, trade: &TradeResult) {
        let label = trade.entry_state.market.regime.as_str();
        if !label.is_empty() {
            if let Some(prev) = self.last_regime.as_deref() {
                if !prev.eq_ignore_ascii_case(label) {
                    ctx.train_on_regime_shift(prev, label, trade.profit > 0.0);
                    self.report.regime_shifts += 1;
                }
            }
            self.last_regime = Some(label.to_string());
        }

        let outcome = ctx.train_on_closed_trade(trade);
        self.report.trades += 1;
        if outcome.update.is_accepted() {
            self.report.accepted += 1;
        } else {
            self.report.skipped += 1;
        }
    }
}

pub fn replay(ctx: &mut LearningContext, trades: &[TradeResult]) -> ReplayReport {
    let mut replayer = Replayer::new();
    for trade in trades {
        replayer.feed(ctx, trade);
    }
    replayer.report()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::snapshot::{StateSnapshot, TradeAction};
    use std::io::{Cursor, Write};

    fn line(symbol: &str, profit: f64, regime: &str) -> String {
        let mut state = StateSnapshot::default();
        state.market.regime = regime.to_string();
        let t = TradeResult::new(symbol, TradeAction::Buy, profit, profit / 10.0, state);
        serde_json::to_string(&t).unwrap()
    }

    #[test]
    fn test_read_skips_blank_and_comments() {
        let raw = format!("# header\n{}\n\n{}\n", line("BTC", 5.0, "STABLE"), line("ETH", -2.0, "STABLE"));
        let trades = read_trades(Cursor::new(raw)).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[1].symbol, "ETH");
    }

    #[test]
    fn test_bad_line_reports_number() {
        let raw = format!("{}\nnot json\n", line("BTC", 5.0, "STABLE"));
        let err = read_trades(Cursor::new(raw)).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", line("BTC", 5.0, "STABLE")).unwrap();
        let trades = load_trades(file.path()).unwrap();
        assert_eq!(trades.len(), 1);
    }

    #[test]
    fn test_replay_detects_regime_changes() {
        let trades = read_trades(Cursor::new(format!(
            "{}\n{}\n{}\n",
            line("BTC", 5.0, "STABLE"),
            line("BTC", 3.0, "VOLATILE"),
            line("BTC", -1.0, "volatile"),
        )))
        .unwrap();
        let mut ctx = LearningContext::seeded(Config::default(), 1);
        let report = replay(&mut ctx, &trades);
        assert_eq!(report.trades, 3);
        assert_eq!(report.regime_shifts, 1);
        assert_eq!(report.accepted + report.skipped, 3);
        assert_eq!(ctx.memory().len(), 3);
        assert_eq!(ctx.rules().regime(), crate::regime::Regime::Volatile);
    }
}
