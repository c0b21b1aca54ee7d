use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AssessmentId, BudgetStatus, NotificationId, SkillId, UserId};

/// Outbound message intent, stored alongside the state change that caused it.
///
/// Recipients are referenced by id and resolved when the message is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    #[serde(rename_all = "camelCase")]
    BudgetDecision {
        skill: SkillId,
        faculty: UserId,
        decision: BudgetStatus,
        #[serde(default)]
        rejection_reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AssessmentPublished {
        assessment: AssessmentId,
        student: UserId,
    },
    /// Sent to every student enrolled at delivery time.
    #[serde(rename_all = "camelCase")]
    SkillReminder { skill: SkillId },
    #[serde(rename_all = "camelCase")]
    FeedbackSummary { skill: SkillId, faculty: UserId },
}

impl Notification {
    pub const fn template(&self) -> &'static str {
        match self {
            Notification::BudgetDecision { .. } => "budget_decision",
            Notification::AssessmentPublished { .. } => "assessment_published",
            Notification::SkillReminder { .. } => "skill_reminder",
            Notification::FeedbackSummary { .. } => "feedback_summary",
        }
    }

    pub fn skill(&self) -> Option<&SkillId> {
        match self {
            Notification::BudgetDecision { skill, .. }
            | Notification::SkillReminder { skill }
            | Notification::FeedbackSummary { skill, .. } => Some(skill),
            Notification::AssessmentPublished { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    /// Attempts exhausted; kept for inspection.
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub id: NotificationId,
    pub notification: Notification,
    pub deliver_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revision: u64,
}

impl OutboxEntry {
    pub fn immediate(notification: Notification, now: DateTime<Utc>) -> Self {
        Self::scheduled(notification, now, now)
    }

    pub fn scheduled(
        notification: Notification,
        deliver_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            notification,
            deliver_at,
            created_at: now,
            attempts: 0,
            status: DeliveryStatus::Pending,
            last_error: None,
            delivered_at: None,
            revision: 0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Pending && self.deliver_at <= now
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.status = DeliveryStatus::Delivered;
        self.delivered_at = Some(now);
        self.last_error = None;
    }

    /// Marks the entry failed without further attempts.
    pub fn dead_letter(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.status = DeliveryStatus::Failed;
        self.last_error = Some(error.into());
    }

    pub fn cancel(&mut self) {
        if self.status == DeliveryStatus::Pending {
            self.status = DeliveryStatus::Cancelled;
        }
    }

    /// Records a failed attempt and either reschedules or dead-letters the entry.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> RetryDecision {
        self.attempts += 1;
        self.last_error = Some(error.into());

        if self.attempts >= policy.max_attempts {
            self.status = DeliveryStatus::Failed;
            RetryDecision::Exhausted {
                attempts: self.attempts,
            }
        } else {
            let retry_at = now + policy.delay_for(self.attempts);
            self.deliver_at = retry_at;
            RetryDecision::Retry {
                attempt: self.attempts,
                retry_at,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        attempt: u32,
        retry_at: DateTime<Utc>,
    },
    Exhausted {
        attempts: u32,
    },
}

/// Exponential backoff settings for outbox delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::seconds(30),
            max_backoff: Duration::hours(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `attempt` failures (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.backoff_base * 2_i32.pow(exponent);
        if delay > self.max_backoff {
            self.max_backoff
        } else {
            delay
        }
    }
}
