//! Audit emission for outbound language-model calls
//!
//! The engine records every LLM invocation synchronously: prompt, response,
//! token counts, and the caller-supplied correlation id. Durable persistence
//! and hash-chaining live in the downstream compliance sink; these types only
//! define the emission contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use core_kernel::CorrelationId;

/// One outbound model call, as handed to the audit sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub correlation_id: CorrelationId,
    pub model: String,
    /// Which engine operation made the call
    pub operation: String,
    pub prompt: String,
    pub response: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Monotonic sequence number across the process
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Synchronous audit sink
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Emits audit entries as structured tracing events
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            correlation_id = %entry.correlation_id,
            model = %entry.model,
            operation = %entry.operation,
            prompt_tokens = entry.prompt_tokens,
            completion_tokens = entry.completion_tokens,
            sequence = entry.sequence,
            "llm call audited"
        );
    }
}

/// Append-only in-memory sink, used by tests to assert attribution
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit sink poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        self.entries.lock().expect("audit sink poisoned").push(entry);
    }
}

/// Monotonic call counter shared across concurrent workers.
///
/// The whole read-modify-write cycle holds one lock; incrementing with a
/// separate read and write loses updates under concurrency.
#[derive(Default)]
pub struct CallCounter {
    next: Mutex<u64>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next sequence number.
    pub fn next(&self) -> u64 {
        let mut guard = self.next.lock().expect("call counter poisoned");
        let current = *guard;
        *guard = current + 1;
        current
    }

    pub fn total(&self) -> u64 {
        *self.next.lock().expect("call counter poisoned")
    }
}
