use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{load_skill, require_role, retry_on_conflict, WorkflowError};
use crate::domain::{FeedbackEntry, Role, Skill, SkillId, User, UserSummary};
use crate::notifications::{Notification, OutboxEntry};
use crate::store::{PortalStore, Transaction};

const POSITIVE: [&str; 6] = [
    "excellent",
    "good",
    "great",
    "helpful",
    "informative",
    "engaging",
];
const NEGATIVE: [&str; 6] = [
    "poor",
    "bad",
    "difficult",
    "confusing",
    "boring",
    "unhelpful",
];
const IMPROVEMENT: [&str; 6] = ["suggest", "improve", "could", "should", "better", "more"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmission {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Mean rating and histogram over a skill's feedback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub total_responses: usize,
    pub average_rating: f64,
    pub rating_distribution: BTreeMap<u8, u32>,
}

impl RatingSummary {
    pub fn from_entries(entries: &[FeedbackEntry]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }

        let mut rating_distribution = BTreeMap::new();
        let mut sum = 0u32;
        for entry in entries {
            *rating_distribution.entry(entry.rating).or_insert(0) += 1;
            sum += u32::from(entry.rating);
        }

        Self {
            total_responses: entries.len(),
            average_rating: f64::from(sum) / entries.len() as f64,
            rating_distribution,
        }
    }
}

/// Keyword hit counts per theme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThemes {
    pub positive: BTreeMap<String, u32>,
    pub negative: BTreeMap<String, u32>,
    pub improvement: BTreeMap<String, u32>,
}

/// Tallies fixed theme keywords across comments.
///
/// Comments are lowercased and split on non-word characters; only whole-word
/// matches count.
pub fn analyze_comments<'a>(comments: impl IntoIterator<Item = &'a str>) -> CommentThemes {
    let mut themes = CommentThemes::default();

    for comment in comments {
        let lowered = comment.to_lowercase();
        let words = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|word| !word.is_empty());

        for word in words {
            if POSITIVE.contains(&word) {
                *themes.positive.entry(word.to_string()).or_insert(0) += 1;
            }
            if NEGATIVE.contains(&word) {
                *themes.negative.entry(word.to_string()).or_insert(0) += 1;
            }
            if IMPROVEMENT.contains(&word) {
                *themes.improvement.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    themes
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAnalysis {
    pub skill: SkillId,
    pub skill_name: String,
    pub faculty: Vec<UserSummary>,
    pub total_feedback: usize,
    pub average_rating: f64,
    pub rating_distribution: BTreeMap<u8, u32>,
    pub common_themes: CommentThemes,
}

pub struct FeedbackWorkflow<S> {
    store: Arc<S>,
}

impl<S> FeedbackWorkflow<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stores one rating per enrolled student; feedback cannot be edited later.
    pub fn submit_feedback(
        &self,
        actor: &User,
        skill_id: &SkillId,
        submission: FeedbackSubmission,
        now: DateTime<Utc>,
    ) -> Result<Skill, WorkflowError> {
        require_role(actor, Role::Student)?;
        if !(1..=5).contains(&submission.rating) {
            return Err(WorkflowError::validation("Rating must be between 1 and 5"));
        }
        let comment = submission
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
            .map(str::to_string);

        let skill = retry_on_conflict("submit_feedback", || {
            let mut skill = load_skill(self.store.as_ref(), skill_id)?;
            if !skill.is_student_enrolled(&actor.id) {
                return Err(WorkflowError::forbidden(
                    "You are not enrolled in this skill",
                ));
            }
            if skill.feedback_from(&actor.id).is_some() {
                return Err(WorkflowError::DuplicateFeedback);
            }

            skill.feedback.push(FeedbackEntry {
                student: actor.id.clone(),
                rating: submission.rating,
                comment: comment.clone(),
                submitted_at: now,
            });
            skill.updated_at = now;

            let mut transaction = Transaction::new();
            transaction.put_skill(skill.clone());
            self.store.commit(transaction)?;
            load_skill(self.store.as_ref(), &skill.id)
        })?;

        info!(
            skill = %skill.id,
            student = %actor.id,
            rating = submission.rating,
            "feedback recorded"
        );
        Ok(skill)
    }

    pub fn skill_feedback(
        &self,
        actor: &User,
        skill_id: &SkillId,
    ) -> Result<Vec<FeedbackEntry>, WorkflowError> {
        require_role(actor, Role::Faculty)?;
        let skill = load_skill(self.store.as_ref(), skill_id)?;
        if !skill.is_faculty(&actor.id) {
            return Err(WorkflowError::forbidden(
                "Not authorized to view feedback for this skill",
            ));
        }
        Ok(skill.feedback)
    }

    /// Ratings and comment themes for every skill that has feedback.
    pub fn feedback_analysis(&self, actor: &User) -> Result<Vec<FeedbackAnalysis>, WorkflowError> {
        require_role(actor, Role::SkillTeam)?;

        let mut analysis = Vec::new();
        for skill in self.store.skills()? {
            if skill.feedback.is_empty() {
                continue;
            }

            let summary = RatingSummary::from_entries(&skill.feedback);
            let mut faculty = Vec::with_capacity(skill.faculty.len());
            for id in &skill.faculty {
                if let Some(user) = self.store.user(id)? {
                    faculty.push(user.summary());
                }
            }

            analysis.push(FeedbackAnalysis {
                common_themes: analyze_comments(
                    skill
                        .feedback
                        .iter()
                        .filter_map(|entry| entry.comment.as_deref()),
                ),
                skill: skill.id,
                skill_name: skill.name,
                faculty,
                total_feedback: summary.total_responses,
                average_rating: summary.average_rating,
                rating_distribution: summary.rating_distribution,
            });
        }
        Ok(analysis)
    }

    /// Queues a summary email to each faculty member of the skill.
    pub fn send_feedback_summary(
        &self,
        actor: &User,
        skill_id: &SkillId,
        now: DateTime<Utc>,
    ) -> Result<usize, WorkflowError> {
        require_role(actor, Role::SkillTeam)?;
        let skill = load_skill(self.store.as_ref(), skill_id)?;

        let mut transaction = Transaction::new();
        for faculty in &skill.faculty {
            transaction.put_notification(OutboxEntry::immediate(
                Notification::FeedbackSummary {
                    skill: skill.id.clone(),
                    faculty: faculty.clone(),
                },
                now,
            ));
        }
        let queued = transaction.notification_count();
        self.store.commit(transaction)?;

        info!(skill = %skill.id, queued, "feedback summary queued");
        Ok(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn entry(rating: u8, comment: Option<&str>) -> FeedbackEntry {
        FeedbackEntry {
            student: UserId::generate(),
            rating,
            comment: comment.map(str::to_string),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn themes_count_whole_words_case_insensitively() {
        let themes = analyze_comments([
            "Great sessions, very HELPFUL!",
            "Could be better; more examples would help. Great lab.",
            "Boring slides",
        ]);

        assert_eq!(themes.positive.get("great"), Some(&2));
        assert_eq!(themes.positive.get("helpful"), Some(&1));
        assert_eq!(themes.negative.get("boring"), Some(&1));
        assert_eq!(themes.improvement.get("could"), Some(&1));
        assert_eq!(themes.improvement.get("better"), Some(&1));
        assert_eq!(themes.improvement.get("more"), Some(&1));
        assert!(!themes.positive.contains_key("help"));
    }

    #[test]
    fn rating_summary_builds_histogram() {
        let summary = RatingSummary::from_entries(&[
            entry(5, Some("excellent")),
            entry(4, None),
            entry(5, None),
        ]);

        assert_eq!(summary.total_responses, 3);
        assert!((summary.average_rating - 14.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.rating_distribution.get(&5), Some(&2));
        assert_eq!(summary.rating_distribution.get(&4), Some(&1));
    }

    #[test]
    fn empty_feedback_summarizes_to_zero() {
        assert_eq!(RatingSummary::from_entries(&[]), RatingSummary::default());
    }
}
