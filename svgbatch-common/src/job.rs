use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One unit of work: clean `input` and write the result to `output`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Job {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Outcome of one finished (or crashed) job.
///
/// Size, ratio and timing fields only carry meaning when `crashed` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub input: PathBuf,
    pub output: PathBuf,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub compress_ratio: f64, // output / input * 100, >= 100 means no reduction
    pub elapsed_ms: u64,
    pub attr_final: u64,
    pub elem_final: u64,
    pub crashed: bool,
}

impl ResultRecord {
    /// Builds a successful record, deriving the compression ratio from the sizes.
    pub fn cleaned(job: &Job, input_bytes: u64, output_bytes: u64, elapsed_ms: u64) -> Self {
        Self {
            input: job.input.clone(),
            output: job.output.clone(),
            input_bytes,
            output_bytes,
            compress_ratio: compress_ratio(input_bytes, output_bytes),
            elapsed_ms,
            attr_final: 0,
            elem_final: 0,
            crashed: false,
        }
    }

    /// Builds a record for a job whose transform failed.
    pub fn crashed(job: &Job, input_bytes: u64) -> Self {
        Self {
            input: job.input.clone(),
            output: job.output.clone(),
            input_bytes,
            output_bytes: 0,
            compress_ratio: 0.0,
            elapsed_ms: 0,
            attr_final: 0,
            elem_final: 0,
            crashed: true,
        }
    }

    pub fn with_counts(mut self, attr_final: u64, elem_final: u64) -> Self {
        self.attr_final = attr_final;
        self.elem_final = elem_final;
        self
    }
}

/// `output / input * 100`. An empty input counts as "no reduction".
pub fn compress_ratio(input_bytes: u64, output_bytes: u64) -> f64 {
    if input_bytes == 0 {
        return 100.0;
    }
    output_bytes as f64 / input_bytes as f64 * 100.0
}
