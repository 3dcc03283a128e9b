//! Pipeline orchestration and domain logic for Harvester.
//!
//! Ties together search, ranking, fetching, conversion and persistence into
//! one per-topic state machine driven by [`Pipeline::run`].

pub mod convert;
pub mod pipeline;
pub mod ranker;
pub mod state;

pub use convert::{ContentConverter, Conversion};
pub use pipeline::{
    Collaborators, Pipeline, ProgressReporter, RunOutput, SilentProgress, topic_base_path,
};
pub use ranker::{Ranker, ScoreBreakdown};
pub use state::{Continuation, RunState};
