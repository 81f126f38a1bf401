//! Long-report mode.
//!
//! A [`ReportPlanner`] produces an immutable [`ReportPlan`]. The
//! [`SectionProcessor`] then writes one section per invocation into a
//! [`ReportSession`], whose completed list is append-only and whose cursor
//! is the single source of truth for what comes next. [`compile`] turns
//! the session into a [`FinalReport`]. [`ReportWriter`] runs the whole
//! sequence under a report-level iteration bound.

mod compiler;
mod plan;
mod planner;
mod progress;
mod section;
mod writer;

pub use compiler::{compile, FinalReport};
pub use plan::{apportion, ReportPlan, Section};
pub use planner::ReportPlanner;
pub use progress::{CompletedSection, CompletedSections, ProgressState, ReportSession};
pub use section::{SectionCursor, SectionOutcome, SectionProcessor, SectionStep};
pub use writer::ReportWriter;
