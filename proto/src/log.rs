use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of one log record. The integer form is the configured threshold
/// unit: records below the threshold are not persisted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl LogLevel {
    pub fn from_i32(level: i32) -> Option<Self> {
        Some(match level {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            5 => LogLevel::Fatal,
            6 => LogLevel::Panic,
            _ => return None,
        })
    }

    pub fn as_i32(&self) -> i32 { *self as i32 }
}

/// One entry on the backend log stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub application: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
