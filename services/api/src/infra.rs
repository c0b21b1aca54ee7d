use metrics_exporter_prometheus::PrometheusHandle;
use skill_portal::config::StorageConfig;
use skill_portal::domain::{Role, StudentType};
use skill_portal::error::AppError;
use skill_portal::notifications::{EmailMessage, MailError, Mailer};
use skill_portal::store::InMemoryStore;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Snapshot-backed when a data path is configured, otherwise memory only.
pub(crate) fn open_store(config: &StorageConfig) -> Result<InMemoryStore, AppError> {
    match &config.data_path {
        Some(path) => {
            info!(path = %path.display(), "opening snapshot store");
            Ok(InMemoryStore::open(path.clone())?)
        }
        None => {
            warn!("APP_DATA_PATH not set; documents are kept in memory only");
            Ok(InMemoryStore::new())
        }
    }
}

/// Mailer that keeps every message for later inspection.
#[derive(Default, Clone)]
pub(crate) struct RecordingMailer {
    messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let mut guard = self
            .messages
            .lock()
            .map_err(|_| MailError::Transport("mailbox lock poisoned".to_string()))?;
        guard.push(message.clone());
        Ok(())
    }
}

impl RecordingMailer {
    pub(crate) fn messages(&self) -> Vec<EmailMessage> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

pub(crate) fn parse_role(raw: &str) -> Result<Role, String> {
    Role::parse(raw).ok_or_else(|| format!("unknown role '{raw}' (student, faculty, skillTeam)"))
}

pub(crate) fn parse_student_type(raw: &str) -> Result<StudentType, String> {
    StudentType::parse(raw)
        .ok_or_else(|| format!("unknown student type '{raw}' (dayScholar, hosteller)"))
}
