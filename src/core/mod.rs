pub mod composer;
pub mod engine;
pub mod entropy_filter;
pub mod fragmenter;
pub mod generator;
pub mod recorder;
pub mod signals;
pub mod stage;
pub mod stats;
pub mod synthesizer;

pub use crate::domain::model::{Artifact, Envelope, Feedback, JournalEntry, Pulse, Stability, Verdict};
pub use crate::domain::ports::{RunOutcome, ScriptRunner, Storage, TextGenerator};
pub use crate::utils::error::Result;
