//! Structured logging for the adaptive-learning core.
//!
//! Design goals:
//! 1. Multi-level granularity (TRACE → FATAL)
//! 2. Domain-specific categories for filtering (reward, weights, memory, ...)
//! 3. Audit support via state fingerprints on export/import
//! 4. One JSON object per line so dashboards can tail the stream

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Reward,     // Reward / penalty scalar computation
    Weights,    // Weight mutation, clamping, resets
    Regime,     // Regime detection and switches
    Memory,     // Experience store pushes, evictions, compression
    Adaptation, // Confidence gate, accepted / skipped updates
    Audit,      // Export / import fingerprints
    System,     // Startup, config, shutdown
    Profile,    // Performance profiling
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Reward => "reward",
            Domain::Weights => "weights",
            Domain::Regime => "regime",
            Domain::Memory => "memory",
            Domain::Adaptation => "adaptation",
            Domain::Audit => "audit",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Sequence counter for ordering
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sinks: Option<FileSinks>,
}

#[derive(Debug)]
struct FileSinks {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let sinks = std::env::var("LOG_DIR")
            .ok()
            .and_then(|base| open_sinks(PathBuf::from(base).join(&run_id), &run_id));
        RunContext { run_id, sinks }
    })
}

/// Identifier shared by every record of this process.
pub fn run_id() -> &'static str {
    &ensure_run_context().run_id
}

fn open_sinks(run_dir: PathBuf, run_id: &str) -> Option<FileSinks> {
    if let Err(err) = create_dir_all(&run_dir) {
        eprintln!("[log] failed to create run dir: {}", err);
        return None;
    }
    let _ = std::fs::write(
        run_dir.join("manifest.json"),
        json!({
            "run_id": run_id,
            "ts": ts_now(),
            "pid": process::id(),
            "log_dir": run_dir.to_string_lossy(),
        })
        .to_string(),
    );

    let events = File::create(run_dir.join("events.jsonl"))
        .map_err(|err| eprintln!("[log] failed to create events log: {}", err))
        .ok()?;
    let trace = File::create(run_dir.join("trace.jsonl"))
        .map_err(|err| eprintln!("[log] failed to create trace log: {}", err))
        .ok()?;

    Some(FileSinks {
        events: Mutex::new(BufWriter::new(events)),
        trace: Mutex::new(BufWriter::new(trace)),
    })
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain, event, fields);
}

fn emit_record(level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) {
    let ctx = ensure_run_context();

    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));

    let line = Value::Object(entry).to_string();
    if let Some(sinks) = &ctx.sinks {
        match level {
            Level::Trace | Level::Debug => write_line(&sinks.trace, &line),
            _ => write_line(&sinks.events, &line),
        }
    }
    eprintln!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_reward(kind: &str, symbol: &str, value: f64, components: &[(&str, f64)]) {
    let parts: Map<String, Value> = components
        .iter()
        .map(|(k, v)| (k.to_string(), v_num(*v)))
        .collect();

    log(
        Level::Debug,
        Domain::Reward,
        kind,
        obj(&[
            ("symbol", v_str(symbol)),
            ("value", v_num(value)),
            ("components", Value::Object(parts)),
        ]),
    );
}

pub fn log_weight_change(key: &str, before: f64, after: f64, reason: &str) {
    log(
        Level::Debug,
        Domain::Weights,
        "weight_change",
        obj(&[
            ("key", v_str(key)),
            ("before", v_num(before)),
            ("after", v_num(after)),
            ("reason", v_str(reason)),
        ]),
    );
}

pub fn log_weight_clamped(key: &str, requested: f64, applied: f64) {
    log(
        Level::Warn,
        Domain::Weights,
        "weight_clamped",
        obj(&[
            ("key", v_str(key)),
            ("requested", v_num(requested)),
            ("applied", v_num(applied)),
        ]),
    );
}

pub fn log_regime_change(from: &str, to: &str, reason: &str) {
    log(
        Level::Info,
        Domain::Regime,
        "regime_change",
        obj(&[
            ("from", v_str(from)),
            ("to", v_str(to)),
            ("reason", v_str(reason)),
        ]),
    );
}

pub fn log_unknown_regime(name: &str, operation: &str) {
    log(
        Level::Warn,
        Domain::Regime,
        "unknown_regime",
        obj(&[
            ("regime", v_str(name)),
            ("operation", v_str(operation)),
            ("msg", v_str("unknown regime ignored")),
        ]),
    );
}

pub fn log_eviction(timestamp: u64, importance: f64, reviewed: bool, size: usize) {
    log(
        Level::Debug,
        Domain::Memory,
        "evict",
        obj(&[
            ("entry_ts", json!(timestamp)),
            ("importance", v_num(importance)),
            ("reviewed", json!(reviewed)),
            ("size", json!(size)),
        ]),
    );
}

pub fn log_compression(before: usize, after: usize, target: usize) {
    log(
        Level::Info,
        Domain::Memory,
        "compress",
        obj(&[
            ("before", json!(before)),
            ("after", json!(after)),
            ("target", json!(target)),
        ]),
    );
}

pub fn log_config_clamped(field: &str, requested: f64, applied: f64) {
    log(
        Level::Warn,
        Domain::System,
        "config_out_of_range",
        obj(&[
            ("field", v_str(field)),
            ("requested", v_num(requested)),
            ("applied", v_num(applied)),
        ]),
    );
}

pub fn log_update(status: &str, reward: f64, penalty: f64, confidence: f64, deltas: usize) {
    let level = if status == "accepted" { Level::Info } else { Level::Debug };
    log(
        level,
        Domain::Adaptation,
        "update",
        obj(&[
            ("status", v_str(status)),
            ("reward", v_num(reward)),
            ("penalty", v_num(penalty)),
            ("confidence", v_num(confidence)),
            ("deltas", json!(deltas)),
        ]),
    );
}

pub fn log_audit(event: &str, target: &str, fingerprint: &str) {
    log(
        Level::Info,
        Domain::Audit,
        event,
        obj(&[("target", v_str(target)), ("fingerprint", v_str(fingerprint))]),
    );
}

pub fn log_import_rejected(target: &str, reason: &str) {
    log(
        Level::Error,
        Domain::Audit,
        "import_rejected",
        obj(&[("target", v_str(target)), ("reason", v_str(reason))]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            context: None,
            started: Instant::now(),
        }
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: Some(obj(fields)),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================
