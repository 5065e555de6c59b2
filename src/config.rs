//! Interpreter configuration

use crate::error::VmError;
use serde::Deserialize;

/// Default limit on nested activations
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1_000;

/// Default limit on interpreter runs nested inside primitives
///
/// Sends and block evaluation never grow the native stack; only primitives
/// that call back into the interpreter (loops, `perform:`, recovery sends)
/// do, each by one native run.
pub const DEFAULT_MAX_REENTRY_DEPTH: usize = 100;

/// Tunable interpreter settings
///
/// Missing fields take their defaults, so `{}` is a valid configuration:
///
/// ```
/// use talkvm::VmConfig;
///
/// let config = VmConfig::from_json(r#"{ "max_call_depth": 64 }"#).unwrap();
/// assert_eq!(config.max_call_depth, 64);
/// assert!(!config.trace_execution);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Nested activations allowed before the run is aborted
    pub max_call_depth: usize,
    /// Native interpreter runs allowed to nest through primitives
    pub max_reentry_depth: usize,
    /// Log every executed bytecode at `trace` level
    pub trace_execution: bool,
    /// Log a disassembly of every installed method at `debug` level
    pub dump_bytecode: bool,
    /// Also write transcript output to stdout
    pub echo_transcript: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_reentry_depth: DEFAULT_MAX_REENTRY_DEPTH,
            trace_execution: false,
            dump_bytecode: false,
            echo_transcript: false,
        }
    }
}

impl VmConfig {
    pub fn from_json(json: &str) -> Result<Self, VmError> {
        serde_json::from_str(json)
            .map_err(|e| VmError::internal(format!("invalid configuration: {}", e)))
    }

    /// Defaults overridden by `TALKVM_MAX_CALL_DEPTH`,
    /// `TALKVM_MAX_REENTRY_DEPTH`, `TALKVM_TRACE` and `TALKVM_DUMP_BYTECODE`.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(depth) = env_number("TALKVM_MAX_CALL_DEPTH") {
            config.max_call_depth = depth;
        }
        if let Some(depth) = env_number("TALKVM_MAX_REENTRY_DEPTH") {
            config.max_reentry_depth = depth;
        }
        if let Some(trace) = env_flag("TALKVM_TRACE") {
            config.trace_execution = trace;
        }
        if let Some(dump) = env_flag("TALKVM_DUMP_BYTECODE") {
            config.dump_bytecode = dump;
        }
        config
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_reentry_depth(mut self, depth: usize) -> Self {
        self.max_reentry_depth = depth;
        self
    }

    pub fn with_trace_execution(mut self, enabled: bool) -> Self {
        self.trace_execution = enabled;
        self
    }

    pub fn with_dump_bytecode(mut self, enabled: bool) -> Self {
        self.dump_bytecode = enabled;
        self
    }

    pub fn with_echo_transcript(mut self, enabled: bool) -> Self {
        self.echo_transcript = enabled;
        self
    }
}

fn env_number(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
