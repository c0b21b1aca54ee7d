use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::scoring::{calculate_score, ScoringPolicy};
use crate::domain::assessment::default_points;
use crate::domain::{
    AnswerOption, Assessment, AssessmentId, AssessmentPhase, AssessmentStatistics,
    AssessmentStatus, OptionId, Question, QuestionId, Role, SkillId, StudentAssessmentView,
    StudentResponse, SubmittedAnswer, User, UserSummary,
};
use crate::notifications::{Notification, OutboxEntry};
use crate::store::{PortalStore, StoreError, Transaction};
use crate::workflows::{
    load_assessment, load_skill, require_role, retry_on_conflict, WorkflowError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<OptionDraft>,
    #[serde(default = "default_points")]
    pub points: u32,
}

impl QuestionDraft {
    fn into_question(self) -> Question {
        Question {
            id: QuestionId::generate(),
            text: self.text.trim().to_string(),
            options: self
                .options
                .into_iter()
                .map(|option| AnswerOption {
                    id: OptionId::generate(),
                    text: option.text.trim().to_string(),
                    is_correct: option.is_correct,
                })
                .collect(),
            points: self.points,
        }
    }
}

/// Faculty input for a new assessment; ids are assigned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub questions: Vec<QuestionDraft>,
    pub duration: u32,
    pub passing_score: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Partial edit of a draft; `questions` replaces the whole question list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<QuestionDraft>>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub passing_score: Option<u32>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSubmission {
    pub answers: Vec<SubmittedAnswer>,
}

/// A student's own outcome on an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResult {
    pub assessment: AssessmentId,
    pub score: u32,
    pub total_points: u32,
    pub passing_score: u32,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSummary {
    pub student: UserSummary,
    pub score: u32,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResults {
    pub assessment: Assessment,
    pub phase: AssessmentPhase,
    pub responses: Vec<ResponseSummary>,
    pub statistics: AssessmentStatistics,
}

pub struct AssessmentWorkflow<S> {
    store: Arc<S>,
    policy: ScoringPolicy,
}

impl<S> AssessmentWorkflow<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>, policy: ScoringPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    /// Creates a draft and links it from the owning skill in one commit.
    pub fn create_assessment(
        &self,
        actor: &User,
        skill_id: &SkillId,
        draft: AssessmentDraft,
        now: DateTime<Utc>,
    ) -> Result<Assessment, WorkflowError> {
        require_role(actor, Role::Faculty)?;

        let mut assessment = Assessment {
            id: AssessmentId::generate(),
            skill: skill_id.clone(),
            title: draft.title.trim().to_string(),
            description: normalize_description(draft.description),
            questions: draft
                .questions
                .into_iter()
                .map(QuestionDraft::into_question)
                .collect(),
            duration: draft.duration,
            total_points: 0,
            passing_score: draft.passing_score,
            start_time: draft.start_time,
            end_time: draft.end_time,
            student_responses: Vec::new(),
            created_by: actor.id.clone(),
            status: AssessmentStatus::Draft,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        assessment.recompute_total_points();

        let created = retry_on_conflict("create_assessment", || {
            let mut skill = load_skill(self.store.as_ref(), skill_id)?;
            if !skill.is_faculty(&actor.id) {
                return Err(WorkflowError::forbidden(
                    "Not authorized to create assessment for this skill",
                ));
            }
            validate(&assessment)?;

            skill.assessment = Some(assessment.id.clone());
            skill.updated_at = now;

            let mut transaction = Transaction::new();
            transaction
                .put_assessment(assessment.clone())
                .put_skill(skill);
            self.store.commit(transaction)?;
            load_assessment(self.store.as_ref(), &assessment.id)
        })?;

        info!(
            assessment = %created.id,
            skill = %created.skill,
            questions = created.questions.len(),
            total_points = created.total_points,
            "assessment drafted"
        );
        Ok(created)
    }

    pub fn update_assessment(
        &self,
        actor: &User,
        assessment_id: &AssessmentId,
        update: AssessmentUpdate,
        now: DateTime<Utc>,
    ) -> Result<Assessment, WorkflowError> {
        require_role(actor, Role::Faculty)?;

        retry_on_conflict("update_assessment", || {
            let mut assessment = self.owned_draft(
                actor,
                assessment_id,
                "Not authorized to update this assessment",
                "Cannot update published or completed assessment",
            )?;

            let update = update.clone();
            if let Some(title) = update.title {
                assessment.title = title.trim().to_string();
            }
            if update.description.is_some() {
                assessment.description = normalize_description(update.description);
            }
            if let Some(questions) = update.questions {
                assessment.questions = questions
                    .into_iter()
                    .map(QuestionDraft::into_question)
                    .collect();
            }
            if let Some(duration) = update.duration {
                assessment.duration = duration;
            }
            if let Some(passing_score) = update.passing_score {
                assessment.passing_score = passing_score;
            }
            if let Some(start_time) = update.start_time {
                assessment.start_time = start_time;
            }
            if let Some(end_time) = update.end_time {
                assessment.end_time = end_time;
            }
            assessment.recompute_total_points();
            assessment.updated_at = now;
            validate(&assessment)?;

            let mut transaction = Transaction::new();
            transaction.put_assessment(assessment.clone());
            self.store.commit(transaction)?;
            load_assessment(self.store.as_ref(), &assessment.id)
        })
    }

    /// Publishes a draft and queues a notice to every enrolled student.
    pub fn publish_assessment(
        &self,
        actor: &User,
        assessment_id: &AssessmentId,
        now: DateTime<Utc>,
    ) -> Result<Assessment, WorkflowError> {
        require_role(actor, Role::Faculty)?;

        let (published, notified) = retry_on_conflict("publish_assessment", || {
            let mut assessment = self.owned_draft(
                actor,
                assessment_id,
                "Not authorized to publish this assessment",
                "Assessment is already published or completed",
            )?;
            let skill = load_skill(self.store.as_ref(), &assessment.skill)?;

            assessment.status = AssessmentStatus::Published;
            assessment.updated_at = now;

            let mut transaction = Transaction::new();
            for enrollment in &skill.enrolled_students {
                transaction.put_notification(OutboxEntry::immediate(
                    Notification::AssessmentPublished {
                        assessment: assessment.id.clone(),
                        student: enrollment.student.clone(),
                    },
                    now,
                ));
            }
            let notified = transaction.notification_count();
            transaction.put_assessment(assessment.clone());
            self.store.commit(transaction)?;
            Ok((load_assessment(self.store.as_ref(), &assessment.id)?, notified))
        })?;

        info!(assessment = %published.id, notified, "assessment published");
        Ok(published)
    }

    /// Scores and records a student's single attempt.
    pub fn submit_assessment(
        &self,
        actor: &User,
        assessment_id: &AssessmentId,
        submission: AssessmentSubmission,
        now: DateTime<Utc>,
    ) -> Result<StudentResult, WorkflowError> {
        require_role(actor, Role::Student)?;

        let result = retry_on_conflict("submit_assessment", || {
            let mut assessment = load_assessment(self.store.as_ref(), assessment_id)?;
            let skill = load_skill(self.store.as_ref(), &assessment.skill)?;
            if !skill.is_student_enrolled(&actor.id) {
                return Err(WorkflowError::forbidden(
                    "You are not enrolled in this skill",
                ));
            }
            if !assessment.is_active(now) {
                return Err(WorkflowError::NotActive);
            }
            if assessment.has_student_submitted(&actor.id) {
                return Err(WorkflowError::AlreadySubmitted);
            }

            let breakdown =
                calculate_score(&submission.answers, &assessment.questions, self.policy);
            assessment.student_responses.push(StudentResponse {
                student: actor.id.clone(),
                answers: submission.answers.clone(),
                score: breakdown.score,
                submitted_at: now,
            });
            assessment.updated_at = now;

            let result = StudentResult {
                assessment: assessment.id.clone(),
                score: breakdown.score,
                total_points: assessment.total_points,
                passing_score: assessment.passing_score,
                passed: assessment.passed(breakdown.score),
                submitted_at: now,
            };

            let mut transaction = Transaction::new();
            transaction.put_assessment(assessment);
            self.store.commit(transaction)?;
            Ok(result)
        })?;

        info!(
            assessment = %result.assessment,
            student = %actor.id,
            score = result.score,
            passed = result.passed,
            "assessment submitted"
        );
        Ok(result)
    }

    pub fn student_result(
        &self,
        actor: &User,
        assessment_id: &AssessmentId,
    ) -> Result<StudentResult, WorkflowError> {
        require_role(actor, Role::Student)?;
        let assessment = load_assessment(self.store.as_ref(), assessment_id)?;
        let response = assessment
            .response_for(&actor.id)
            .ok_or(WorkflowError::NotFound("Submission"))?;

        Ok(StudentResult {
            assessment: assessment.id.clone(),
            score: response.score,
            total_points: assessment.total_points,
            passing_score: assessment.passing_score,
            passed: assessment.passed(response.score),
            submitted_at: response.submitted_at,
        })
    }

    /// Responses and statistics for the creator or any faculty of the skill.
    pub fn results(
        &self,
        actor: &User,
        assessment_id: &AssessmentId,
        now: DateTime<Utc>,
    ) -> Result<AssessmentResults, WorkflowError> {
        require_role(actor, Role::Faculty)?;
        let assessment = load_assessment(self.store.as_ref(), assessment_id)?;
        let allowed = assessment.created_by == actor.id
            || self
                .store
                .skill(&assessment.skill)?
                .is_some_and(|skill| skill.is_faculty(&actor.id));
        if !allowed {
            return Err(WorkflowError::forbidden(
                "Not authorized to view these results",
            ));
        }

        let mut responses = Vec::with_capacity(assessment.student_responses.len());
        for response in &assessment.student_responses {
            let student = match self.store.user(&response.student)? {
                Some(user) => user.summary(),
                None => UserSummary {
                    id: response.student.clone(),
                    name: String::new(),
                    email: String::new(),
                },
            };
            responses.push(ResponseSummary {
                student,
                score: response.score,
                passed: assessment.passed(response.score),
                submitted_at: response.submitted_at,
            });
        }

        Ok(AssessmentResults {
            phase: assessment.phase(now),
            statistics: assessment.statistics(),
            responses,
            assessment,
        })
    }

    /// Published, currently open assessments of the student's enrolled skills.
    pub fn available_assessments(
        &self,
        actor: &User,
        now: DateTime<Utc>,
    ) -> Result<Vec<StudentAssessmentView>, WorkflowError> {
        require_role(actor, Role::Student)?;

        let enrolled: Vec<SkillId> = self
            .store
            .skills()?
            .into_iter()
            .filter(|skill| skill.is_student_enrolled(&actor.id))
            .map(|skill| skill.id)
            .collect();

        let mut open: Vec<Assessment> = self
            .store
            .assessments()?
            .into_iter()
            .filter(|assessment| enrolled.contains(&assessment.skill))
            .filter(|assessment| assessment.phase(now) == AssessmentPhase::Open)
            .collect();
        open.sort_by_key(|assessment| assessment.end_time);

        Ok(open.iter().map(Assessment::student_view).collect())
    }

    /// Marks published assessments whose window has ended as completed.
    pub fn close_expired(&self, now: DateTime<Utc>) -> Result<usize, WorkflowError> {
        let mut closed = 0;
        for mut assessment in self.store.assessments()? {
            if assessment.status != AssessmentStatus::Published || assessment.end_time >= now {
                continue;
            }

            let id = assessment.id.clone();
            assessment.status = AssessmentStatus::Completed;
            assessment.updated_at = now;

            let mut transaction = Transaction::new();
            transaction.put_assessment(assessment);
            match self.store.commit(transaction) {
                Ok(()) => {
                    info!(assessment = %id, "assessment completed");
                    closed += 1;
                }
                // A submission landed first; the next sweep retries.
                Err(StoreError::Conflict(reason)) => {
                    warn!(assessment = %id, %reason, "completion deferred");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(closed)
    }

    fn owned_draft(
        &self,
        actor: &User,
        assessment_id: &AssessmentId,
        forbidden: &'static str,
        not_draft: &'static str,
    ) -> Result<Assessment, WorkflowError> {
        let assessment = load_assessment(self.store.as_ref(), assessment_id)?;
        if assessment.created_by != actor.id {
            return Err(WorkflowError::forbidden(forbidden));
        }
        if assessment.status != AssessmentStatus::Draft {
            return Err(WorkflowError::invalid_state(not_draft));
        }
        Ok(assessment)
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn validate(assessment: &Assessment) -> Result<(), WorkflowError> {
    if assessment.title.is_empty() {
        return Err(WorkflowError::validation("Assessment title is required"));
    }
    if assessment.questions.is_empty() {
        return Err(WorkflowError::validation(
            "An assessment needs at least one question",
        ));
    }
    for (index, question) in assessment.questions.iter().enumerate() {
        let number = index + 1;
        if question.text.is_empty() {
            return Err(WorkflowError::validation(format!(
                "Question {number} has no text"
            )));
        }
        if question.options.len() < 2 {
            return Err(WorkflowError::validation(format!(
                "Question {number} needs at least two options"
            )));
        }
        if question.options.iter().any(|option| option.text.is_empty()) {
            return Err(WorkflowError::validation(format!(
                "Question {number} has an empty option"
            )));
        }
        if question.correct_options().next().is_none() {
            return Err(WorkflowError::validation(format!(
                "Question {number} needs a correct option"
            )));
        }
        if question.points == 0 {
            return Err(WorkflowError::validation(format!(
                "Question {number} must be worth at least one point"
            )));
        }
    }
    if assessment.duration == 0 {
        return Err(WorkflowError::validation(
            "Duration must be at least one minute",
        ));
    }
    if assessment.start_time >= assessment.end_time {
        return Err(WorkflowError::validation(
            "Start time must be before end time",
        ));
    }
    if assessment.checked_total_points().is_none() {
        return Err(WorkflowError::validation(
            "Total points exceed the supported range",
        ));
    }
    if assessment.passing_score > assessment.total_points {
        return Err(WorkflowError::validation(
            "Passing score cannot exceed total points",
        ));
    }
    Ok(())
}
