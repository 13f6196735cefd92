use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::ResultRecord;

/// Ordering applied to a finished result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortCriterion {
    #[default]
    Name,
    Size,
    Compression,
    Attributes,
    Elements,
    Time,
}

impl SortCriterion {
    pub const ALL: [SortCriterion; 6] = [
        SortCriterion::Name,
        SortCriterion::Size,
        SortCriterion::Compression,
        SortCriterion::Attributes,
        SortCriterion::Elements,
        SortCriterion::Time,
    ];

    pub fn compare(&self, a: &ResultRecord, b: &ResultRecord) -> Ordering {
        match self {
            SortCriterion::Name => file_key(a).cmp(&file_key(b)),
            SortCriterion::Size => a.output_bytes.cmp(&b.output_bytes),
            // highest ratio (least reduced) first
            SortCriterion::Compression => b.compress_ratio.total_cmp(&a.compress_ratio),
            SortCriterion::Attributes => a.attr_final.cmp(&b.attr_final),
            SortCriterion::Elements => a.elem_final.cmp(&b.elem_final),
            SortCriterion::Time => a.elapsed_ms.cmp(&b.elapsed_ms),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortCriterion::Name => "name",
            SortCriterion::Size => "size",
            SortCriterion::Compression => "compression",
            SortCriterion::Attributes => "attributes",
            SortCriterion::Elements => "elements",
            SortCriterion::Time => "time",
        }
    }
}

fn file_key(record: &ResultRecord) -> String {
    record.output.to_string_lossy().to_lowercase()
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortCriterion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let lower = s.to_ascii_lowercase();
        SortCriterion::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| anyhow::anyhow!("unknown sort criterion '{}'", s))
    }
}

/// Stable sort, equal keys keep their arrival order.
pub fn sort_results(results: &mut [ResultRecord], criterion: SortCriterion) {
    results.sort_by(|a, b| criterion.compare(a, b));
}
