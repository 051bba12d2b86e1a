//! Audit trail of stage outcomes
//!
//! Each stage of a run (dataset sync, dashboard clone, collection
//! association) reports success or failure to an [`AuditSink`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::sync::Mutex;

/// Records queued before the log sink writes them out on its own
pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub stage: String,
    pub error_message: Option<String>,
}

impl AuditRecord {
    pub fn success(stage: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            success: true,
            stage: stage.into(),
            error_message: None,
        }
    }

    pub fn failure(stage: impl Into<String>, error: impl ToString) -> Self {
        Self {
            timestamp: Utc::now(),
            success: false,
            stage: stage.into(),
            error_message: Some(error.to_string()),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
    async fn flush(&self);
}

/// Buffers records and writes them as JSON lines through the `log` facade
#[derive(Debug)]
pub struct LogAuditSink {
    buffer: Mutex<Vec<AuditRecord>>,
    flush_threshold: usize,
}

impl LogAuditSink {
    pub fn new(flush_threshold: usize) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            flush_threshold: flush_threshold.max(1),
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn drain(&self) -> Vec<AuditRecord> {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(|p| p.into_inner()))
    }

    fn write(records: &[AuditRecord]) {
        for record in records {
            match serde_json::to_string(record) {
                Ok(line) => info!(target: "audit", "{}", line),
                Err(e) => log::error!(target: "audit", "Unserializable audit record: {}", e),
            }
        }
    }
}

impl Default for LogAuditSink {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_THRESHOLD)
    }
}

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, record: AuditRecord) {
        let full = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
            buffer.push(record);
            if buffer.len() >= self.flush_threshold {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };
        if let Some(records) = full {
            Self::write(&records);
        }
    }

    async fn flush(&self) {
        let records = self.drain();
        Self::write(&records);
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn failures(&self) -> Vec<AuditRecord> {
        self.records().into_iter().filter(|r| !r.success).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).push(record);
    }

    async fn flush(&self) {}
}
