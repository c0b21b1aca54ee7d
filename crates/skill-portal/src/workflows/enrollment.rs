use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::{load_skill, load_user, require_role, retry_on_conflict, WorkflowError};
use crate::domain::{Enrollment, Role, Skill, SkillId, User};
use crate::store::{PortalStore, Transaction};

/// Student registration into active skills.
pub struct EnrollmentWorkflow<S> {
    store: Arc<S>,
    per_type_limit: usize,
}

impl<S> EnrollmentWorkflow<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>, per_type_limit: usize) -> Self {
        Self {
            store,
            per_type_limit,
        }
    }

    /// Enrolls the student, writing both sides of the relationship in one commit.
    ///
    /// Checks run in a fixed order so each failure is reported distinctly:
    /// availability, duplicate, type compatibility, per-type limit, capacity.
    pub fn register_student(
        &self,
        actor: &User,
        skill_id: &SkillId,
        now: DateTime<Utc>,
    ) -> Result<Skill, WorkflowError> {
        require_role(actor, Role::Student)?;

        let skill = retry_on_conflict("register_student", || {
            let mut skill = load_skill(self.store.as_ref(), skill_id)?;
            let mut student = load_user(self.store.as_ref(), &actor.id)?;

            self.check_eligibility(&skill, &student)?;

            skill.enrolled_students.push(Enrollment {
                student: student.id.clone(),
                enrolled_at: now,
            });
            skill.updated_at = now;
            if !student.enrolled_skills.contains(&skill.id) {
                student.enrolled_skills.push(skill.id.clone());
            }
            student.updated_at = now;

            let mut transaction = Transaction::new();
            transaction.put_skill(skill.clone()).put_user(student);
            self.store.commit(transaction)?;
            load_skill(self.store.as_ref(), &skill.id)
        })?;

        info!(
            skill = %skill.id,
            student = %actor.id,
            enrolled = skill.enrolled_students.len(),
            capacity = skill.budget.number_of_students,
            "student enrolled"
        );
        Ok(skill)
    }

    /// Approved, active skills the student's type allows them to join.
    pub fn available_skills(&self, actor: &User) -> Result<Vec<Skill>, WorkflowError> {
        require_role(actor, Role::Student)?;
        let mut skills: Vec<Skill> = self
            .store
            .skills()?
            .into_iter()
            .filter(|skill| skill.is_open_for_enrollment())
            .filter(|skill| actor.can_enroll_in(skill.skill_type))
            .map(|mut skill| {
                skill.budget.rejection_reason = None;
                skill.attendance.clear();
                skill
            })
            .collect();
        skills.sort_by_key(|skill| skill.schedule.start_date);
        Ok(skills)
    }

    pub fn enrolled_skills(&self, actor: &User) -> Result<Vec<Skill>, WorkflowError> {
        require_role(actor, Role::Student)?;
        let mut skills: Vec<Skill> = self
            .store
            .skills()?
            .into_iter()
            .filter(|skill| skill.is_student_enrolled(&actor.id))
            .collect();
        skills.sort_by_key(|skill| skill.schedule.start_date);
        Ok(skills)
    }

    fn check_eligibility(&self, skill: &Skill, student: &User) -> Result<(), WorkflowError> {
        if !skill.is_open_for_enrollment() {
            return Err(WorkflowError::NotAvailable);
        }
        if skill.is_student_enrolled(&student.id) {
            return Err(WorkflowError::AlreadyEnrolled);
        }
        if !student.can_enroll_in(skill.skill_type) {
            return Err(WorkflowError::TypeMismatch);
        }
        if self.enrolled_of_type(student, skill)? >= self.per_type_limit {
            return Err(WorkflowError::LimitReached {
                skill_type: skill.skill_type,
            });
        }
        if !skill.has_available_slots() {
            return Err(WorkflowError::CapacityExceeded);
        }
        Ok(())
    }

    fn enrolled_of_type(&self, student: &User, target: &Skill) -> Result<usize, WorkflowError> {
        let mut count = 0;
        for skill_id in &student.enrolled_skills {
            if skill_id == &target.id {
                continue;
            }
            if let Some(skill) = self.store.skill(skill_id)? {
                if skill.skill_type == target.skill_type {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}
