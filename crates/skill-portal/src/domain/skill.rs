use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssessmentId, SkillId, UserId};

/// Session timing of a skill; day scholars are restricted to `Day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    Day,
    Night,
    Both,
}

impl SkillType {
    pub const ALL: [SkillType; 3] = [SkillType::Day, SkillType::Night, SkillType::Both];

    pub const fn label(self) -> &'static str {
        match self {
            SkillType::Day => "day",
            SkillType::Night => "night",
            SkillType::Both => "both",
        }
    }
}

impl fmt::Display for SkillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Pending,
    Approved,
    Rejected,
}

impl BudgetStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BudgetStatus::Pending => "pending",
            BudgetStatus::Approved => "approved",
            BudgetStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    Draft,
    Pending,
    Active,
    Completed,
}

/// Faculty cost and capacity proposal reviewed by the skill team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub number_of_venues: u32,
    /// Enrollment capacity of the skill.
    pub number_of_students: u32,
    pub amount: f64,
    pub status: BudgetStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub venue: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student: UserId,
    pub enrolled_at: DateTime<Utc>,
}

/// Presence list for one calendar day of a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub present_students: Vec<UserId>,
    pub marked_by: UserId,
}

impl AttendanceRecord {
    pub fn is_present(&self, student: &UserId) -> bool {
        self.present_students.contains(student)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub student: UserId,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    #[serde(rename = "type")]
    pub skill_type: SkillType,
    pub faculty: Vec<UserId>,
    pub budget: Budget,
    pub schedule: Schedule,
    #[serde(default)]
    pub enrolled_students: Vec<Enrollment>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub feedback: Vec<FeedbackEntry>,
    #[serde(default)]
    pub assessment: Option<AssessmentId>,
    pub status: SkillStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

impl Skill {
    /// Approved budget and active status; the gate for new enrollments.
    pub fn is_open_for_enrollment(&self) -> bool {
        self.budget.status == BudgetStatus::Approved && self.status == SkillStatus::Active
    }

    pub fn has_available_slots(&self) -> bool {
        self.enrolled_students.len() < self.budget.number_of_students as usize
    }

    pub fn remaining_slots(&self) -> u32 {
        let enrolled = u32::try_from(self.enrolled_students.len()).unwrap_or(u32::MAX);
        self.budget.number_of_students.saturating_sub(enrolled)
    }

    pub fn is_student_enrolled(&self, student: &UserId) -> bool {
        self.enrolled_students
            .iter()
            .any(|enrollment| &enrollment.student == student)
    }

    pub fn is_faculty(&self, user: &UserId) -> bool {
        self.faculty.contains(user)
    }

    pub fn attendance_on(&self, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.attendance.iter().find(|record| record.date == date)
    }

    pub fn feedback_from(&self, student: &UserId) -> Option<&FeedbackEntry> {
        self.feedback.iter().find(|entry| &entry.student == student)
    }

    /// Share of recorded sessions the student attended, as a percentage.
    ///
    /// A skill with no attendance records reports 100.
    pub fn student_attendance(&self, student: &UserId) -> f64 {
        let total = self.attendance.len();
        if total == 0 {
            return 100.0;
        }

        let attended = self
            .attendance
            .iter()
            .filter(|record| record.is_present(student))
            .count();

        attended as f64 / total as f64 * 100.0
    }
}
