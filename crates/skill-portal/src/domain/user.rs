use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{SkillId, UserId};
use super::skill::SkillType;

/// Portal role; gates which route group an account may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Student,
    Faculty,
    SkillTeam,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::SkillTeam => "skillTeam",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "student" => Some(Role::Student),
            "faculty" => Some(Role::Faculty),
            "skillTeam" | "skill_team" | "skill-team" => Some(Role::SkillTeam),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Residence category of a student; decides which skill types they may join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudentType {
    DayScholar,
    Hosteller,
}

impl StudentType {
    pub const fn label(self) -> &'static str {
        match self {
            StudentType::DayScholar => "dayScholar",
            StudentType::Hosteller => "hosteller",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "dayScholar" | "day_scholar" | "day-scholar" => Some(StudentType::DayScholar),
            "hosteller" => Some(StudentType::Hosteller),
            _ => None,
        }
    }
}

/// Identity asserted by the external sign-in provider on first login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentity {
    pub google_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_type: Option<StudentType>,
    #[serde(default)]
    pub enrolled_skills: Vec<SkillId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

impl User {
    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    /// Day scholars may only join day skills; hostellers may join any type.
    pub fn can_enroll_in(&self, skill_type: SkillType) -> bool {
        if !self.is_student() {
            return false;
        }

        match self.student_type {
            Some(StudentType::Hosteller) => true,
            Some(StudentType::DayScholar) | None => skill_type == SkillType::Day,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Name and contact fields exposed when one account is shown to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}
