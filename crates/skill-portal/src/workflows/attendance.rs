use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use super::{load_skill, require_role, retry_on_conflict, WorkflowError};
use crate::domain::{AttendanceRecord, Role, Skill, SkillId, User, UserId, UserSummary};
use crate::store::{PortalStore, Transaction};

/// Body of a mark-attendance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheet {
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub present_students: Vec<UserId>,
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; only the date is kept.
fn calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn parse_calendar_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc).date_naive()))
        .map_err(|_| format!("invalid attendance date: {raw}"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub student: UserSummary,
    pub attendance_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub date: NaiveDate,
    pub present: bool,
}

/// One enrolled skill from the student's own perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillAttendance {
    pub skill: SkillId,
    pub skill_name: String,
    pub attendance_percentage: f64,
    pub attendance_details: Vec<AttendanceMark>,
}

pub struct AttendanceWorkflow<S> {
    store: Arc<S>,
}

impl<S> AttendanceWorkflow<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Records who attended on a calendar date; one record per date.
    pub fn mark_attendance(
        &self,
        actor: &User,
        skill_id: &SkillId,
        sheet: AttendanceSheet,
        now: DateTime<Utc>,
    ) -> Result<Skill, WorkflowError> {
        require_role(actor, Role::Faculty)?;

        let mut present: Vec<UserId> = Vec::with_capacity(sheet.present_students.len());
        for student in sheet.present_students {
            if !present.contains(&student) {
                present.push(student);
            }
        }

        let skill = retry_on_conflict("mark_attendance", || {
            let mut skill = load_skill(self.store.as_ref(), skill_id)?;
            if !skill.is_faculty(&actor.id) {
                return Err(WorkflowError::forbidden(
                    "Not authorized to mark attendance for this skill",
                ));
            }
            if skill.attendance_on(sheet.date).is_some() {
                return Err(WorkflowError::DuplicateAttendance);
            }
            if let Some(stranger) = present
                .iter()
                .find(|student| !skill.is_student_enrolled(student))
            {
                return Err(WorkflowError::validation(format!(
                    "Student {stranger} is not enrolled in this skill"
                )));
            }

            skill.attendance.push(AttendanceRecord {
                date: sheet.date,
                present_students: present.clone(),
                marked_by: actor.id.clone(),
            });
            skill.attendance.sort_by_key(|record| record.date);
            skill.updated_at = now;

            let mut transaction = Transaction::new();
            transaction.put_skill(skill.clone());
            self.store.commit(transaction)?;
            load_skill(self.store.as_ref(), &skill.id)
        })?;

        info!(
            skill = %skill.id,
            date = %sheet.date,
            present = present.len(),
            enrolled = skill.enrolled_students.len(),
            "attendance marked"
        );
        Ok(skill)
    }

    /// Attendance percentage of every enrolled student, in enrollment order.
    pub fn attendance_stats(
        &self,
        actor: &User,
        skill_id: &SkillId,
    ) -> Result<Vec<StudentAttendance>, WorkflowError> {
        require_role(actor, Role::Faculty)?;
        let skill = load_skill(self.store.as_ref(), skill_id)?;
        if !skill.is_faculty(&actor.id) {
            return Err(WorkflowError::forbidden(
                "Not authorized to view attendance for this skill",
            ));
        }

        let mut stats = Vec::with_capacity(skill.enrolled_students.len());
        for enrollment in &skill.enrolled_students {
            let student = match self.store.user(&enrollment.student)? {
                Some(user) => user.summary(),
                None => UserSummary {
                    id: enrollment.student.clone(),
                    name: String::new(),
                    email: String::new(),
                },
            };
            stats.push(StudentAttendance {
                attendance_percentage: skill.student_attendance(&enrollment.student),
                student,
            });
        }
        Ok(stats)
    }

    pub fn my_attendance(&self, actor: &User) -> Result<Vec<SkillAttendance>, WorkflowError> {
        require_role(actor, Role::Student)?;
        let mut skills: Vec<Skill> = self
            .store
            .skills()?
            .into_iter()
            .filter(|skill| skill.is_student_enrolled(&actor.id))
            .collect();
        skills.sort_by_key(|skill| skill.schedule.start_date);

        Ok(skills
            .iter()
            .map(|skill| SkillAttendance {
                skill: skill.id.clone(),
                skill_name: skill.name.clone(),
                attendance_percentage: skill.student_attendance(&actor.id),
                attendance_details: skill
                    .attendance
                    .iter()
                    .map(|record| AttendanceMark {
                        date: record.date,
                        present: record.is_present(&actor.id),
                    })
                    .collect(),
            })
            .collect())
    }
}
