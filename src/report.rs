//! Run summary uploaded to the telemetry endpoint.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::usage::ResourceUsage;

/// One sequential-vs-parallel run.
///
/// Field names follow the JSON documents already stored by the telemetry
/// endpoint, hence the odd `maxRssKB` and `RB`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub matrix_rows: usize,
    pub matrix_cols: usize,
    pub num_processes: usize,
    pub backend: String,
    pub time_seq_ms: u64,
    pub time_par_ms: u64,
    /// `None` when the parallel run took no measurable time.
    pub speedup: Option<f64>,
    pub cpu_user_ms: u64,
    pub cpu_sys_ms: u64,
    #[serde(rename = "maxRssKB")]
    pub max_rss_kb: i64,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(rename = "RB")]
    pub platform: String,
}

/// Measurements a [`RunReport`] is built from.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub rows: usize,
    pub cols: usize,
    pub workers: usize,
    pub backend: String,
    pub sequential: Duration,
    pub parallel: Duration,
    pub usage: ResourceUsage,
}

impl RunReport {
    pub fn new(stats: &RunStats, platform: impl Into<String>) -> Self {
        Self {
            matrix_rows: stats.rows,
            matrix_cols: stats.cols,
            num_processes: stats.workers,
            backend: stats.backend.clone(),
            time_seq_ms: millis(stats.sequential),
            time_par_ms: millis(stats.parallel),
            speedup: speedup(stats.sequential, stats.parallel),
            cpu_user_ms: millis(stats.usage.user),
            cpu_sys_ms: millis(stats.usage.system),
            max_rss_kb: stats.usage.max_rss_kb,
            timestamp: Utc::now().timestamp(),
            platform: platform.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Ratio of sequential to parallel wall-clock time.
pub fn speedup(sequential: Duration, parallel: Duration) -> Option<f64> {
    if parallel.is_zero() {
        return None;
    }
    Some(sequential.as_secs_f64() / parallel.as_secs_f64())
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
