//! Run-scoped cost accounting.
//!
//! Append-only: parallel stages record concurrently, totals never decrease,
//! and usage consumed before a cancellation is kept on the books.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One recorded reasoning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub stage: String,
    pub units: u64,
    pub estimated_cost_usd: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate view over a run's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub calls: usize,
    pub total_units: u64,
    pub total_cost_usd: f64,
}

/// Append-only ledger shared by the stages of one run.
#[derive(Debug, Default)]
pub struct CostLedger {
    records: Mutex<Vec<CostRecord>>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, stage: &str, units: u64, estimated_cost_usd: f64) {
        let mut records = self.records.lock().expect("cost ledger poisoned");
        records.push(CostRecord {
            stage: stage.to_string(),
            units,
            estimated_cost_usd,
            recorded_at: Utc::now(),
        });
    }

    pub fn total(&self) -> CostSummary {
        let records = self.records.lock().expect("cost ledger poisoned");
        CostSummary {
            calls: records.len(),
            total_units: records.iter().map(|r| r.units).sum(),
            total_cost_usd: records.iter().map(|r| r.estimated_cost_usd).sum(),
        }
    }

    pub fn records(&self) -> Vec<CostRecord> {
        self.records.lock().expect("cost ledger poisoned").clone()
    }

    /// Re-seed a fresh ledger from a suspended run's snapshot so accounting
    /// stays continuous across a suspend/resume cycle.
    pub fn restore(&self, records: Vec<CostRecord>) {
        let mut current = self.records.lock().expect("cost ledger poisoned");
        current.extend(records);
    }
}
