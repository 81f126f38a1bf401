//! Standard mode: iterative research followed by a single synthesized answer.

mod controller;
mod state;

pub use controller::{ResearchAnswer, ResearchController};
pub use state::{label_evidence, ResearchState, NO_RESEARCH_CONTENT};
