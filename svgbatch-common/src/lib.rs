pub mod common_config;
pub mod format;
pub mod job;
pub mod queue;
pub mod select;
pub mod sort;
pub mod stats;

pub use format::{prepare_percent, prepare_size, prepare_time};
pub use job::{compress_ratio, Job, ResultRecord};
pub use queue::JobQueue;
pub use select::{is_svg_path, plan_jobs};
pub use sort::{sort_results, SortCriterion};
pub use stats::{AggregateStats, StatisticsAggregator};
