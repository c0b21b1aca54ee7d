use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssessmentId, OptionId, QuestionId, SkillId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<AnswerOption>,
    #[serde(default = "default_points")]
    pub points: u32,
}

pub(crate) fn default_points() -> u32 {
    1
}

impl Question {
    pub fn option(&self, id: &OptionId) -> Option<&AnswerOption> {
        self.options.iter().find(|option| &option.id == id)
    }

    pub fn correct_options(&self) -> impl Iterator<Item = &OptionId> {
        self.options
            .iter()
            .filter(|option| option.is_correct)
            .map(|option| &option.id)
    }
}

/// One answer entry as submitted by a student.
///
/// Single-choice clients send `selectedOption`; multi-select clients send
/// `selectedOptions`. Both may be present and are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question: QuestionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<OptionId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_options: Vec<OptionId>,
}

impl SubmittedAnswer {
    pub fn selections(&self) -> Vec<&OptionId> {
        let mut selections: Vec<&OptionId> = Vec::new();
        for id in self
            .selected_option
            .iter()
            .chain(self.selected_options.iter())
        {
            if !selections.contains(&id) {
                selections.push(id);
            }
        }
        selections
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResponse {
    pub student: UserId,
    pub answers: Vec<SubmittedAnswer>,
    pub score: u32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentStatus {
    Draft,
    Published,
    Completed,
}

/// Lifecycle position derived from status and the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentPhase {
    Draft,
    Scheduled,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: AssessmentId,
    pub skill: SkillId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub questions: Vec<Question>,
    /// Minutes a student has once started.
    pub duration: u32,
    pub total_points: u32,
    pub passing_score: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub student_responses: Vec<StudentResponse>,
    pub created_by: UserId,
    pub status: AssessmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

impl Assessment {
    /// Submission window check; the status field is not consulted.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now <= self.end_time
    }

    pub fn has_student_submitted(&self, student: &UserId) -> bool {
        self.response_for(student).is_some()
    }

    pub fn response_for(&self, student: &UserId) -> Option<&StudentResponse> {
        self.student_responses
            .iter()
            .find(|response| &response.student == student)
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| &question.id == id)
    }

    /// Saturates at `u32::MAX`; see [`Assessment::checked_total_points`].
    pub fn recompute_total_points(&mut self) {
        self.total_points = self
            .questions
            .iter()
            .fold(0u32, |total, question| total.saturating_add(question.points));
    }

    /// Sum of question points, or `None` when it does not fit in a `u32`.
    pub fn checked_total_points(&self) -> Option<u32> {
        self.questions
            .iter()
            .try_fold(0u32, |total, question| total.checked_add(question.points))
    }

    pub fn passed(&self, score: u32) -> bool {
        score >= self.passing_score
    }

    pub fn phase(&self, now: DateTime<Utc>) -> AssessmentPhase {
        match self.status {
            AssessmentStatus::Draft => AssessmentPhase::Draft,
            AssessmentStatus::Completed => AssessmentPhase::Closed,
            AssessmentStatus::Published if now < self.start_time => AssessmentPhase::Scheduled,
            AssessmentStatus::Published if now > self.end_time => AssessmentPhase::Closed,
            AssessmentStatus::Published => AssessmentPhase::Open,
        }
    }

    pub fn statistics(&self) -> AssessmentStatistics {
        let total = self.student_responses.len();
        if total == 0 {
            return AssessmentStatistics::default();
        }

        let scores: Vec<u32> = self
            .student_responses
            .iter()
            .map(|response| response.score)
            .collect();
        let passed = scores.iter().filter(|score| self.passed(**score)).count();
        let sum: u64 = scores.iter().map(|score| u64::from(*score)).sum();

        AssessmentStatistics {
            total_responses: total,
            average_score: sum as f64 / total as f64,
            pass_rate: passed as f64 / total as f64 * 100.0,
            highest_score: scores.iter().copied().max().unwrap_or(0),
            lowest_score: scores.iter().copied().min().unwrap_or(0),
        }
    }

    /// Copy safe to show students: correctness flags and responses removed.
    pub fn student_view(&self) -> StudentAssessmentView {
        StudentAssessmentView {
            id: self.id.clone(),
            skill: self.skill.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            questions: self
                .questions
                .iter()
                .map(|question| StudentQuestionView {
                    id: question.id.clone(),
                    text: question.text.clone(),
                    options: question
                        .options
                        .iter()
                        .map(|option| StudentOptionView {
                            id: option.id.clone(),
                            text: option.text.clone(),
                        })
                        .collect(),
                    points: question.points,
                })
                .collect(),
            duration: self.duration,
            total_points: self.total_points,
            passing_score: self.passing_score,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentStatistics {
    pub total_responses: usize,
    pub average_score: f64,
    pub pass_rate: f64,
    pub highest_score: u32,
    pub lowest_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOptionView {
    pub id: OptionId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuestionView {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<StudentOptionView>,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssessmentView {
    pub id: AssessmentId,
    pub skill: SkillId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub questions: Vec<StudentQuestionView>,
    pub duration: u32,
    pub total_points: u32,
    pub passing_score: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
