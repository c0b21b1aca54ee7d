//! Role-gated portal workflows composed behind [`SkillPortal`].
//!
//! Every workflow loads documents, validates against the caller and the
//! current state, then stages all resulting writes (including outbox
//! notifications) into a single [`Transaction`](crate::store::Transaction).

pub mod analytics;
pub mod assessment;
pub mod attendance;
pub mod budget;
pub mod enrollment;
mod error;
pub mod feedback;
pub mod identity;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::debug;

pub use analytics::{EnrollmentStats, SkillAnalytics, SkillStatistics, SkillTypeStats};
pub use assessment::{
    calculate_score, AssessmentDraft, AssessmentResults, AssessmentSubmission, AssessmentUpdate,
    AssessmentWorkflow, OptionDraft, QuestionDraft, ResponseSummary, ScoreBreakdown,
    ScoringPolicy, StudentResult,
};
pub use attendance::{
    AttendanceMark, AttendanceSheet, AttendanceWorkflow, SkillAttendance, StudentAttendance,
};
pub use budget::{BudgetReview, BudgetSubmission, BudgetWorkflow, ScheduleUpdate, SkillUpdate};
pub use enrollment::EnrollmentWorkflow;
pub use error::WorkflowError;
pub use feedback::{
    analyze_comments, CommentThemes, FeedbackAnalysis, FeedbackSubmission, FeedbackWorkflow,
    RatingSummary,
};
pub use identity::{IdentityDirectory, ProfileUpdate};

use crate::domain::{Assessment, AssessmentId, Role, Skill, SkillId, User, UserId};
use crate::store::{PortalStore, StoreError};

const CONFLICT_ATTEMPTS: u32 = 3;

/// Tunables shared by the workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Institutional suffix every account email must carry, without `@`.
    pub email_domain: String,
    pub scoring_policy: ScoringPolicy,
    /// Enrolled skills a student may hold per skill type.
    pub skill_type_limit: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            email_domain: "bitsathy.ac.in".to_string(),
            scoring_policy: ScoringPolicy::SingleOption,
            skill_type_limit: 1,
        }
    }
}

/// Facade wiring every workflow to one shared store.
pub struct SkillPortal<S> {
    store: Arc<S>,
    settings: WorkflowSettings,
    identity: IdentityDirectory<S>,
    budgets: BudgetWorkflow<S>,
    enrollment: EnrollmentWorkflow<S>,
    attendance: AttendanceWorkflow<S>,
    feedback: FeedbackWorkflow<S>,
    assessments: AssessmentWorkflow<S>,
    analytics: SkillAnalytics<S>,
}

impl<S> SkillPortal<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>, settings: WorkflowSettings) -> Self {
        Self {
            identity: IdentityDirectory::new(store.clone(), settings.email_domain.clone()),
            budgets: BudgetWorkflow::new(store.clone()),
            enrollment: EnrollmentWorkflow::new(store.clone(), settings.skill_type_limit),
            attendance: AttendanceWorkflow::new(store.clone()),
            feedback: FeedbackWorkflow::new(store.clone()),
            assessments: AssessmentWorkflow::new(store.clone(), settings.scoring_policy),
            analytics: SkillAnalytics::new(store.clone()),
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn identity(&self) -> &IdentityDirectory<S> {
        &self.identity
    }

    pub fn budgets(&self) -> &BudgetWorkflow<S> {
        &self.budgets
    }

    pub fn enrollment(&self) -> &EnrollmentWorkflow<S> {
        &self.enrollment
    }

    pub fn attendance(&self) -> &AttendanceWorkflow<S> {
        &self.attendance
    }

    pub fn feedback(&self) -> &FeedbackWorkflow<S> {
        &self.feedback
    }

    pub fn assessments(&self) -> &AssessmentWorkflow<S> {
        &self.assessments
    }

    pub fn analytics(&self) -> &SkillAnalytics<S> {
        &self.analytics
    }
}

/// Re-runs a read-validate-commit cycle when the commit lost a revision race.
///
/// The closure must reload every document it writes so validation sees the
/// winning state; duplicate-style errors then surface on the next pass.
pub(crate) fn retry_on_conflict<T>(
    operation: &'static str,
    mut attempt: impl FnMut() -> Result<T, WorkflowError>,
) -> Result<T, WorkflowError> {
    let mut tries = 1;
    loop {
        match attempt() {
            Err(WorkflowError::Store(StoreError::Conflict(reason))) if tries < CONFLICT_ATTEMPTS => {
                debug!(operation, tries, %reason, "concurrent update; retrying");
                tries += 1;
            }
            outcome => return outcome,
        }
    }
}

pub(crate) fn require_role(actor: &User, role: Role) -> Result<(), WorkflowError> {
    if actor.role == role {
        return Ok(());
    }

    let message = match role {
        Role::Student => "Only students can access this route",
        Role::Faculty => "Only faculty members can access this route",
        Role::SkillTeam => "Only skill team members can access this route",
    };
    Err(WorkflowError::forbidden(message))
}

pub(crate) fn load_skill<S>(store: &S, id: &SkillId) -> Result<Skill, WorkflowError>
where
    S: PortalStore + ?Sized,
{
    store.skill(id)?.ok_or(WorkflowError::NotFound("Skill"))
}

pub(crate) fn load_assessment<S>(store: &S, id: &AssessmentId) -> Result<Assessment, WorkflowError>
where
    S: PortalStore + ?Sized,
{
    store
        .assessment(id)?
        .ok_or(WorkflowError::NotFound("Assessment"))
}

pub(crate) fn load_user<S>(store: &S, id: &UserId) -> Result<User, WorkflowError>
where
    S: PortalStore + ?Sized,
{
    store.user(id)?.ok_or(WorkflowError::NotFound("User"))
}
