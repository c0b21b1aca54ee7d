//! Document storage behind a trait so workflows can run against any backend.
//!
//! Writes are staged in a [`Transaction`] and committed all-or-nothing. Every
//! document carries a `revision`; a commit is rejected with
//! [`StoreError::Conflict`] when any staged document was read at a revision
//! that is no longer current.

mod memory;

pub use memory::InMemoryStore;

use chrono::{DateTime, Utc};

use crate::domain::{Assessment, AssessmentId, NotificationId, Skill, SkillId, User, UserId};
use crate::notifications::OutboxEntry;

pub trait PortalStore: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    fn user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;
    fn users(&self) -> Result<Vec<User>, StoreError>;

    fn skill(&self, id: &SkillId) -> Result<Option<Skill>, StoreError>;
    fn skills(&self) -> Result<Vec<Skill>, StoreError>;

    fn assessment(&self, id: &AssessmentId) -> Result<Option<Assessment>, StoreError>;
    fn assessments(&self) -> Result<Vec<Assessment>, StoreError>;

    fn notification(&self, id: &NotificationId) -> Result<Option<OutboxEntry>, StoreError>;
    fn notifications(&self) -> Result<Vec<OutboxEntry>, StoreError>;
    /// Pending entries whose delivery time has come, oldest first.
    fn due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OutboxEntry>, StoreError>;

    fn commit(&self, transaction: Transaction) -> Result<(), StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document was modified concurrently: {0}")]
    Conflict(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Set of document writes applied together by [`PortalStore::commit`].
#[derive(Debug, Default, Clone)]
pub struct Transaction {
    pub(crate) users: Vec<User>,
    pub(crate) skills: Vec<Skill>,
    pub(crate) assessments: Vec<Assessment>,
    pub(crate) notifications: Vec<OutboxEntry>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_user(&mut self, user: User) -> &mut Self {
        self.users.push(user);
        self
    }

    pub fn put_skill(&mut self, skill: Skill) -> &mut Self {
        self.skills.push(skill);
        self
    }

    pub fn put_assessment(&mut self, assessment: Assessment) -> &mut Self {
        self.assessments.push(assessment);
        self
    }

    /// Stages a new outbox entry or an update to an existing one.
    pub fn put_notification(&mut self, entry: OutboxEntry) -> &mut Self {
        self.notifications.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.skills.is_empty()
            && self.assessments.is_empty()
            && self.notifications.is_empty()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.len()
    }
}
