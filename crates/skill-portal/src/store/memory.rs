use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{PortalStore, StoreError, Transaction};
use crate::domain::{Assessment, AssessmentId, NotificationId, Skill, SkillId, User, UserId};
use crate::notifications::OutboxEntry;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    users: BTreeMap<UserId, User>,
    #[serde(default)]
    skills: BTreeMap<SkillId, Skill>,
    #[serde(default)]
    assessments: BTreeMap<AssessmentId, Assessment>,
    #[serde(default)]
    outbox: BTreeMap<NotificationId, OutboxEntry>,
}

/// Mutex-guarded document store with an optional JSON snapshot on disk.
///
/// With a snapshot path every commit writes the complete next state to disk
/// before it becomes visible, so a failed write leaves both copies unchanged.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    snapshot: Option<PathBuf>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a snapshot-backed store, loading the file when it exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read(&path).map_err(|err| {
                StoreError::Unavailable(format!("reading {}: {err}", path.display()))
            })?;
            serde_json::from_slice::<StoreState>(&raw).map_err(|err| {
                StoreError::Unavailable(format!("decoding {}: {err}", path.display()))
            })?
        } else {
            StoreState::default()
        };

        info!(
            path = %path.display(),
            users = state.users.len(),
            skills = state.skills.len(),
            assessments = state.assessments.len(),
            outbox = state.outbox.len(),
            "document store opened"
        );

        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

trait Document: Clone {
    type Key: Ord + Clone + Display;

    fn key(&self) -> &Self::Key;
    fn revision(&self) -> u64;
    fn bump_revision(&mut self);
}

macro_rules! impl_document {
    ($doc:ty, $key:ty) => {
        impl Document for $doc {
            type Key = $key;

            fn key(&self) -> &Self::Key {
                &self.id
            }

            fn revision(&self) -> u64 {
                self.revision
            }

            fn bump_revision(&mut self) {
                self.revision += 1;
            }
        }
    };
}

impl_document!(User, UserId);
impl_document!(Skill, SkillId);
impl_document!(Assessment, AssessmentId);
impl_document!(OutboxEntry, NotificationId);

fn apply<D: Document>(table: &mut BTreeMap<D::Key, D>, docs: Vec<D>) -> Result<(), StoreError> {
    for mut doc in docs {
        match table.get(doc.key()) {
            Some(current) if current.revision() != doc.revision() => {
                return Err(StoreError::Conflict(doc.key().to_string()));
            }
            None if doc.revision() != 0 => {
                return Err(StoreError::NotFound(doc.key().to_string()));
            }
            _ => {}
        }
        doc.bump_revision();
        table.insert(doc.key().clone(), doc);
    }
    Ok(())
}

fn ensure_unique_identities(users: &BTreeMap<UserId, User>, staged: &[User]) -> Result<(), StoreError> {
    for user in staged {
        let clash = users.values().any(|other| {
            other.id != user.id
                && (other.google_id == user.google_id
                    || other.email.eq_ignore_ascii_case(&user.email))
        });
        if clash {
            return Err(StoreError::Conflict(format!(
                "identity already registered: {}",
                user.email
            )));
        }
    }
    Ok(())
}

fn write_snapshot(path: &Path, state: &StoreState) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(state)
        .map_err(|err| StoreError::Unavailable(format!("encoding snapshot: {err}")))?;
    let staging = path.with_extension("tmp");
    fs::write(&staging, bytes)
        .and_then(|_| fs::rename(&staging, path))
        .map_err(|err| StoreError::Unavailable(format!("writing {}: {err}", path.display())))
}

impl PortalStore for InMemoryStore {
    fn user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    fn user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.google_id == google_id)
            .cloned())
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    fn skill(&self, id: &SkillId) -> Result<Option<Skill>, StoreError> {
        Ok(self.lock()?.skills.get(id).cloned())
    }

    fn skills(&self) -> Result<Vec<Skill>, StoreError> {
        Ok(self.lock()?.skills.values().cloned().collect())
    }

    fn assessment(&self, id: &AssessmentId) -> Result<Option<Assessment>, StoreError> {
        Ok(self.lock()?.assessments.get(id).cloned())
    }

    fn assessments(&self) -> Result<Vec<Assessment>, StoreError> {
        Ok(self.lock()?.assessments.values().cloned().collect())
    }

    fn notification(&self, id: &NotificationId) -> Result<Option<OutboxEntry>, StoreError> {
        Ok(self.lock()?.outbox.get(id).cloned())
    }

    fn notifications(&self) -> Result<Vec<OutboxEntry>, StoreError> {
        Ok(self.lock()?.outbox.values().cloned().collect())
    }

    fn due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OutboxEntry>, StoreError> {
        let guard = self.lock()?;
        let mut due: Vec<OutboxEntry> = guard
            .outbox
            .values()
            .filter(|entry| entry.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|entry| entry.deliver_at);
        due.truncate(limit);
        Ok(due)
    }

    fn commit(&self, transaction: Transaction) -> Result<(), StoreError> {
        if transaction.is_empty() {
            return Ok(());
        }

        let mut guard = self.lock()?;
        let mut next = guard.clone();

        let Transaction {
            users,
            skills,
            assessments,
            notifications,
        } = transaction;

        ensure_unique_identities(&next.users, &users)?;
        apply(&mut next.users, users)?;
        apply(&mut next.skills, skills)?;
        apply(&mut next.assessments, assessments)?;
        apply(&mut next.outbox, notifications)?;

        if let Some(path) = &self.snapshot {
            write_snapshot(path, &next)?;
            debug!(path = %path.display(), "snapshot written");
        }

        *guard = next;
        Ok(())
    }
}
