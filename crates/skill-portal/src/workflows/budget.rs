use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{load_skill, require_role, retry_on_conflict, WorkflowError};
use crate::domain::{
    Budget, BudgetStatus, Role, Schedule, Skill, SkillId, SkillStatus, SkillType, User, UserId,
};
use crate::notifications::{DeliveryStatus, Notification, OutboxEntry};
use crate::store::{PortalStore, Transaction};

/// Faculty proposal for a new skill and its budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSubmission {
    pub name: String,
    #[serde(rename = "type")]
    pub skill_type: SkillType,
    pub number_of_venues: u32,
    pub number_of_students: u32,
    pub amount: f64,
    #[serde(default)]
    pub co_faculties: Vec<UserId>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub venue: String,
}

/// Skill-team decision on a pending budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetReview {
    pub status: BudgetStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl BudgetReview {
    pub fn approve() -> Self {
        Self {
            status: BudgetStatus::Approved,
            rejection_reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            status: BudgetStatus::Rejected,
            rejection_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub venue: Option<String>,
}

/// Faculty-editable skill fields; anything else in a request is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schedule: Option<ScheduleUpdate>,
}

/// Budget submission and review plus faculty-side skill maintenance.
pub struct BudgetWorkflow<S> {
    store: Arc<S>,
}

impl<S> BudgetWorkflow<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn submit_budget(
        &self,
        actor: &User,
        submission: BudgetSubmission,
        now: DateTime<Utc>,
    ) -> Result<Skill, WorkflowError> {
        require_role(actor, Role::Faculty)?;
        validate_submission(&submission)?;

        let mut faculty = vec![actor.id.clone()];
        for co_faculty in &submission.co_faculties {
            if faculty.contains(co_faculty) {
                continue;
            }
            match self.store.user(co_faculty)? {
                Some(user) if user.role == Role::Faculty => faculty.push(user.id),
                _ => {
                    return Err(WorkflowError::validation(format!(
                        "Co-faculty {co_faculty} is not a faculty member"
                    )))
                }
            }
        }

        let skill = Skill {
            id: SkillId::generate(),
            name: submission.name.trim().to_string(),
            skill_type: submission.skill_type,
            faculty,
            budget: Budget {
                number_of_venues: submission.number_of_venues,
                number_of_students: submission.number_of_students,
                amount: submission.amount,
                status: BudgetStatus::Pending,
                rejection_reason: None,
                submitted_at: now,
                reviewed_at: None,
            },
            schedule: Schedule {
                start_date: submission.start_date,
                end_date: submission.end_date,
                venue: submission.venue.trim().to_string(),
            },
            enrolled_students: Vec::new(),
            attendance: Vec::new(),
            feedback: Vec::new(),
            assessment: None,
            status: SkillStatus::Pending,
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        let mut transaction = Transaction::new();
        transaction.put_skill(skill.clone());
        self.store.commit(transaction)?;

        info!(
            skill = %skill.id,
            faculty = %actor.id,
            capacity = skill.budget.number_of_students,
            amount = skill.budget.amount,
            "budget submitted"
        );
        load_skill(self.store.as_ref(), &skill.id)
    }

    /// Approves or rejects a pending budget.
    ///
    /// Approval activates the skill and schedules the start reminder. Every
    /// faculty member is notified of the decision in the same commit.
    pub fn review_budget(
        &self,
        actor: &User,
        skill_id: &SkillId,
        review: BudgetReview,
        now: DateTime<Utc>,
    ) -> Result<Skill, WorkflowError> {
        require_role(actor, Role::SkillTeam)?;

        let reason = review
            .rejection_reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty());
        match review.status {
            BudgetStatus::Pending => {
                return Err(WorkflowError::validation(
                    "Review status must be approved or rejected",
                ))
            }
            BudgetStatus::Rejected if reason.is_none() => {
                return Err(WorkflowError::validation(
                    "Rejection reason is required when rejecting a budget",
                ))
            }
            _ => {}
        }

        let skill = retry_on_conflict("review_budget", || {
            let mut skill = load_skill(self.store.as_ref(), skill_id)?;
            if skill.budget.status != BudgetStatus::Pending {
                return Err(WorkflowError::invalid_state(
                    "This budget has already been reviewed",
                ));
            }

            skill.budget.status = review.status;
            skill.budget.reviewed_at = Some(now);
            skill.updated_at = now;

            let mut transaction = Transaction::new();
            if review.status == BudgetStatus::Approved {
                skill.budget.rejection_reason = None;
                skill.status = SkillStatus::Active;
                if let Some(reminder) = start_reminder(&skill, now) {
                    transaction.put_notification(reminder);
                }
            } else {
                skill.budget.rejection_reason = reason.map(str::to_string);
                skill.status = SkillStatus::Draft;
            }

            for faculty in &skill.faculty {
                transaction.put_notification(OutboxEntry::immediate(
                    Notification::BudgetDecision {
                        skill: skill.id.clone(),
                        faculty: faculty.clone(),
                        decision: review.status,
                        rejection_reason: skill.budget.rejection_reason.clone(),
                    },
                    now,
                ));
            }

            transaction.put_skill(skill.clone());
            self.store.commit(transaction)?;
            load_skill(self.store.as_ref(), &skill.id)
        })?;

        info!(
            skill = %skill.id,
            reviewer = %actor.id,
            decision = review.status.label(),
            "budget reviewed"
        );
        Ok(skill)
    }

    pub fn pending_budgets(&self, actor: &User) -> Result<Vec<Skill>, WorkflowError> {
        require_role(actor, Role::SkillTeam)?;
        let mut skills: Vec<Skill> = self
            .store
            .skills()?
            .into_iter()
            .filter(|skill| skill.budget.status == BudgetStatus::Pending)
            .collect();
        skills.sort_by_key(|skill| skill.budget.submitted_at);
        Ok(skills)
    }

    pub fn my_skills(&self, actor: &User) -> Result<Vec<Skill>, WorkflowError> {
        require_role(actor, Role::Faculty)?;
        let mut skills: Vec<Skill> = self
            .store
            .skills()?
            .into_iter()
            .filter(|skill| skill.is_faculty(&actor.id))
            .collect();
        skills.sort_by_key(|skill| skill.created_at);
        Ok(skills)
    }

    /// Applies a name or schedule change.
    ///
    /// Moving the start date of an active skill replaces its pending reminder.
    pub fn update_skill(
        &self,
        actor: &User,
        skill_id: &SkillId,
        update: SkillUpdate,
        now: DateTime<Utc>,
    ) -> Result<Skill, WorkflowError> {
        require_role(actor, Role::Faculty)?;
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(WorkflowError::validation("Skill name cannot be empty"));
            }
        }

        retry_on_conflict("update_skill", || {
            let mut skill = load_skill(self.store.as_ref(), skill_id)?;
            if !skill.is_faculty(&actor.id) {
                return Err(WorkflowError::forbidden(
                    "Not authorized to update this skill",
                ));
            }

            if let Some(name) = &update.name {
                skill.name = name.trim().to_string();
            }

            let mut start_moved = false;
            if let Some(schedule) = &update.schedule {
                if let Some(start) = schedule.start_date {
                    start_moved = start != skill.schedule.start_date;
                    skill.schedule.start_date = start;
                }
                if let Some(end) = schedule.end_date {
                    skill.schedule.end_date = end;
                }
                if let Some(venue) = &schedule.venue {
                    skill.schedule.venue = venue.trim().to_string();
                }
                if skill.schedule.start_date > skill.schedule.end_date {
                    return Err(WorkflowError::validation(
                        "Start date must not be after end date",
                    ));
                }
            }
            skill.updated_at = now;

            let mut transaction = Transaction::new();
            if start_moved && skill.status == SkillStatus::Active {
                for mut reminder in self.pending_reminders(&skill.id)? {
                    reminder.cancel();
                    transaction.put_notification(reminder);
                }
                if let Some(reminder) = start_reminder(&skill, now) {
                    transaction.put_notification(reminder);
                }
                info!(skill = %skill.id, start = %skill.schedule.start_date, "reminder rescheduled");
            }

            transaction.put_skill(skill.clone());
            self.store.commit(transaction)?;
            load_skill(self.store.as_ref(), &skill.id)
        })
    }

    /// Skill as seen by `viewer`; students do not see review notes or attendance.
    pub fn skill_details(&self, viewer: &User, skill_id: &SkillId) -> Result<Skill, WorkflowError> {
        let mut skill = load_skill(self.store.as_ref(), skill_id)?;
        if viewer.role == Role::Student {
            skill.budget.rejection_reason = None;
            skill.attendance.clear();
        }
        Ok(skill)
    }

    fn pending_reminders(&self, skill_id: &SkillId) -> Result<Vec<OutboxEntry>, WorkflowError> {
        Ok(self
            .store
            .notifications()?
            .into_iter()
            .filter(|entry| {
                entry.status == DeliveryStatus::Pending
                    && matches!(&entry.notification, Notification::SkillReminder { skill } if skill == skill_id)
            })
            .collect())
    }
}

/// Reminder due one day before the skill starts, unless that moment has passed.
pub(crate) fn start_reminder(skill: &Skill, now: DateTime<Utc>) -> Option<OutboxEntry> {
    let deliver_at = skill.schedule.start_date - Duration::days(1);
    (deliver_at > now).then(|| {
        OutboxEntry::scheduled(
            Notification::SkillReminder {
                skill: skill.id.clone(),
            },
            deliver_at,
            now,
        )
    })
}

fn validate_submission(submission: &BudgetSubmission) -> Result<(), WorkflowError> {
    if submission.name.trim().is_empty() {
        return Err(WorkflowError::validation("Skill name is required"));
    }
    if submission.number_of_students == 0 {
        return Err(WorkflowError::validation(
            "Number of students must be at least 1",
        ));
    }
    if submission.number_of_venues == 0 {
        return Err(WorkflowError::validation(
            "Number of venues must be at least 1",
        ));
    }
    if !submission.amount.is_finite() || submission.amount < 0.0 {
        return Err(WorkflowError::validation("Amount cannot be negative"));
    }
    if submission.venue.trim().is_empty() {
        return Err(WorkflowError::validation("Venue is required"));
    }
    if submission.start_date > submission.end_date {
        return Err(WorkflowError::validation(
            "Start date must not be after end date",
        ));
    }
    Ok(())
}
