//! Pipeline runner and jobs for contentpipe.
//!
//! [`Runner`] drives one job over one batch of records; [`jobs`] holds the
//! processors for each step from scraping to publishing.

pub mod jobs;
pub mod runner;

pub use jobs::{JOBS, JobDefinition};
pub use runner::{
    CancelSignal, FnProcessor, Outcome, Processor, RecordOutcome, RunOptions, RunProgress,
    RunSummary, Runner, SilentProgress, Transition, from_fn,
};
