use serde::{Deserialize, Serialize};

use crate::job::ResultRecord;

/// Running totals over every result of the current batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub completed_count: u64,
    pub crashed_count: u64,
    pub input_bytes_total: u64,
    pub output_bytes_total: u64,
    pub compress_min: Option<f64>,
    pub compress_max: Option<f64>,
    pub time_min: Option<u64>,
    pub time_max: Option<u64>,
    pub time_total: u64,
}

impl AggregateStats {
    /// Results seen so far, crashed ones included.
    pub fn processed(&self) -> u64 {
        self.completed_count + self.crashed_count
    }

    pub fn average_time_ms(&self) -> Option<u64> {
        (self.completed_count > 0).then(|| self.time_total / self.completed_count)
    }

    /// Overall output/input ratio in percent.
    pub fn average_compression(&self) -> Option<f64> {
        if self.input_bytes_total == 0 || self.output_bytes_total == 0 {
            return None;
        }
        Some(self.output_bytes_total as f64 / self.input_bytes_total as f64 * 100.0)
    }

    /// Largest size reduction in percent (derived from the smallest ratio).
    pub fn best_reduction(&self) -> Option<f64> {
        self.compress_min.map(|ratio| 100.0 - ratio)
    }

    /// Smallest size reduction in percent (derived from the largest ratio).
    pub fn worst_reduction(&self) -> Option<f64> {
        self.compress_max.map(|ratio| 100.0 - ratio)
    }
}

#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    stats: AggregateStats,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.stats = AggregateStats::default();
    }

    pub fn record(&mut self, record: &ResultRecord) {
        let s = &mut self.stats;
        if record.crashed {
            s.crashed_count += 1;
            return;
        }

        s.completed_count += 1;
        s.input_bytes_total += record.input_bytes;
        s.output_bytes_total += record.output_bytes;

        // 0% and >=100% outliers stay in the totals but not in the extrema
        let ratio = record.compress_ratio;
        if ratio > 0.0 && s.compress_min.map_or(true, |min| ratio < min) {
            s.compress_min = Some(ratio);
        }
        if ratio < 100.0 && s.compress_max.map_or(true, |max| ratio > max) {
            s.compress_max = Some(ratio);
        }

        let t = record.elapsed_ms;
        s.time_min = Some(s.time_min.map_or(t, |min| min.min(t)));
        s.time_max = Some(s.time_max.map_or(t, |max| max.max(t)));
        s.time_total += t;
    }

    pub fn snapshot(&self) -> AggregateStats {
        self.stats.clone()
    }
}
