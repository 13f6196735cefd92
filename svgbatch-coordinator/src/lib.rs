//! Pull-dispatch batch coordinator for svgbatch.
//!
//! [`Coordinator`] spreads a list of [`Job`]s over a bounded pool of worker
//! threads, each running a [`TransformInvoker`] on one job at a time, and
//! streams [`CoordinatorEvent`]s back to any number of subscribers.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod invoker;
mod worker;

pub use coordinator::{BatchProgress, Coordinator, RunState};
pub use error::{CoordinatorError, InvokerError};
pub use events::{CoordinatorEvent, WorkerId};
pub use invoker::{markup_counts, CommandInvoker, TransformInvoker};

pub use svgbatch_common::{AggregateStats, Job, ResultRecord};
