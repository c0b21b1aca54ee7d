use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{load_user, require_role, retry_on_conflict, WorkflowError};
use crate::domain::{ExternalIdentity, Role, StudentType, User, UserId};
use crate::store::{PortalStore, StoreError, Transaction};

/// Fields a user may change on their own account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub student_type: Option<StudentType>,
}

/// Account registry fed by the external sign-in provider.
pub struct IdentityDirectory<S> {
    store: Arc<S>,
    email_domain: String,
}

impl<S> IdentityDirectory<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>, email_domain: impl Into<String>) -> Self {
        Self {
            store,
            email_domain: email_domain.into().trim_start_matches('@').to_lowercase(),
        }
    }

    pub fn email_domain(&self) -> &str {
        &self.email_domain
    }

    /// Returns the account for a sign-in identity, creating it on first login.
    ///
    /// New accounts start as day-scholar students.
    pub fn provision(
        &self,
        identity: ExternalIdentity,
        now: DateTime<Utc>,
    ) -> Result<User, WorkflowError> {
        if let Some(existing) = self.store.user_by_google_id(&identity.google_id)? {
            return Ok(existing);
        }

        self.check_email(&identity.email)?;
        let name = identity.name.trim();
        if name.is_empty() {
            return Err(WorkflowError::validation("Name is required"));
        }
        if identity.google_id.trim().is_empty() {
            return Err(WorkflowError::validation("Google account id is required"));
        }

        let user = User {
            id: UserId::generate(),
            google_id: identity.google_id.clone(),
            email: identity.email.trim().to_lowercase(),
            name: name.to_string(),
            role: Role::Student,
            student_type: Some(StudentType::DayScholar),
            enrolled_skills: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        let mut transaction = Transaction::new();
        transaction.put_user(user.clone());
        match self.store.commit(transaction) {
            Ok(()) => {}
            // A concurrent first login for the same account won the race.
            Err(StoreError::Conflict(reason)) => {
                return self
                    .store
                    .user_by_google_id(&identity.google_id)?
                    .ok_or_else(|| WorkflowError::validation(reason));
            }
            Err(err) => return Err(err.into()),
        }

        info!(user = %user.id, email = %user.email, "account provisioned");
        load_user(self.store.as_ref(), &user.id)
    }

    /// Provisions an account and assigns its role without a skill-team actor.
    ///
    /// Reserved for operators bootstrapping the first faculty and skill-team
    /// accounts from the command line.
    pub fn provision_with_role(
        &self,
        identity: ExternalIdentity,
        role: Role,
        student_type: Option<StudentType>,
        now: DateTime<Utc>,
    ) -> Result<User, WorkflowError> {
        let user = self.provision(identity, now)?;
        retry_on_conflict("provision_with_role", || {
            let mut user = load_user(self.store.as_ref(), &user.id)?;
            assign_role(&mut user, role, student_type);
            user.updated_at = now;
            self.save(user)
        })
    }

    pub fn user(&self, id: &UserId) -> Result<User, WorkflowError> {
        load_user(self.store.as_ref(), id)
    }

    pub fn update_profile(
        &self,
        actor: &User,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<User, WorkflowError> {
        let name = match update.name.as_deref().map(str::trim) {
            Some("") => return Err(WorkflowError::validation("Name cannot be empty")),
            other => other.map(str::to_string),
        };

        retry_on_conflict("update_profile", || {
            let mut user = load_user(self.store.as_ref(), &actor.id)?;
            if let Some(name) = &name {
                user.name = name.clone();
            }
            if let Some(student_type) = update.student_type {
                if !user.is_student() {
                    return Err(WorkflowError::validation(
                        "Only students have a student type",
                    ));
                }
                user.student_type = Some(student_type);
            }
            user.updated_at = now;
            self.save(user)
        })
    }

    pub fn update_role(
        &self,
        actor: &User,
        user_id: &UserId,
        role: Role,
        student_type: Option<StudentType>,
        now: DateTime<Utc>,
    ) -> Result<User, WorkflowError> {
        require_role(actor, Role::SkillTeam)?;

        let updated = retry_on_conflict("update_role", || {
            let mut user = self
                .store
                .user(user_id)?
                .ok_or(WorkflowError::NotFound("User"))?;
            assign_role(&mut user, role, student_type);
            user.updated_at = now;
            self.save(user)
        })?;

        info!(actor = %actor.id, user = %updated.id, role = %role, "role updated");
        Ok(updated)
    }

    pub fn list_users(&self, actor: &User) -> Result<Vec<User>, WorkflowError> {
        require_role(actor, Role::SkillTeam)?;
        let mut users = self.store.users()?;
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    fn check_email(&self, email: &str) -> Result<(), WorkflowError> {
        let suffix = format!("@{}", self.email_domain);
        let email = email.trim().to_lowercase();
        if email.len() > suffix.len() && email.ends_with(&suffix) {
            Ok(())
        } else {
            Err(WorkflowError::validation(format!(
                "Only {suffix} email addresses are allowed"
            )))
        }
    }

    fn save(&self, user: User) -> Result<User, WorkflowError> {
        let id = user.id.clone();
        let mut transaction = Transaction::new();
        transaction.put_user(user);
        self.store.commit(transaction)?;
        load_user(self.store.as_ref(), &id)
    }
}

fn assign_role(user: &mut User, role: Role, student_type: Option<StudentType>) {
    user.role = role;
    user.student_type = match role {
        Role::Student => student_type
            .or(user.student_type)
            .or(Some(StudentType::DayScholar)),
        Role::Faculty | Role::SkillTeam => None,
    };
}
