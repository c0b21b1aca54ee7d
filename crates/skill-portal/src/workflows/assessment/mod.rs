//! Assessment authoring, publication, submission and results.
//!
//! An assessment moves `draft -> published -> completed`. Submissions are
//! gated by the start/end window rather than the stored status; the
//! maintenance sweep in [`AssessmentWorkflow::close_expired`] keeps the
//! status in step with the clock.

mod scoring;
mod service;

pub use scoring::{calculate_score, ScoreBreakdown, ScoringPolicy};
pub use service::{
    AssessmentDraft, AssessmentResults, AssessmentSubmission, AssessmentUpdate,
    AssessmentWorkflow, OptionDraft, QuestionDraft, ResponseSummary, StudentResult,
};
