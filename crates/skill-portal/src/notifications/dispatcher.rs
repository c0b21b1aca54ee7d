use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::mailer::Mailer;
use super::outbox::{DeliveryStatus, OutboxEntry, RetryDecision, RetryPolicy};
use super::templates::{render, RenderError};
use crate::store::{PortalStore, StoreError, Transaction};

const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome counters for one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub delivered: usize,
    /// Entries that rendered to nothing (no recipients) and were closed.
    pub skipped: usize,
    pub retried: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn processed(&self) -> usize {
        self.delivered + self.skipped + self.retried + self.failed
    }
}

/// Drains due outbox entries into a [`Mailer`].
///
/// Each entry is committed on its own, so one bad message never holds back
/// the rest of the batch.
pub struct NotificationDispatcher<S, M> {
    store: Arc<S>,
    mailer: Arc<M>,
    policy: RetryPolicy,
    batch_size: usize,
}

impl<S, M> NotificationDispatcher<S, M>
where
    S: PortalStore + 'static,
    M: Mailer + 'static,
{
    pub fn new(store: Arc<S>, mailer: Arc<M>, policy: RetryPolicy) -> Self {
        Self {
            store,
            mailer,
            policy,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn pending_count(&self) -> Result<usize, StoreError> {
        Ok(self
            .store
            .notifications()?
            .iter()
            .filter(|entry| entry.status == DeliveryStatus::Pending)
            .count())
    }

    pub fn dispatch_due(&self, now: DateTime<Utc>) -> Result<DispatchReport, StoreError> {
        let mut report = DispatchReport::default();

        for mut entry in self.store.due_notifications(now, self.batch_size)? {
            match render(&entry, self.store.as_ref()) {
                Ok(Some(message)) => match self.mailer.send(&message) {
                    Ok(()) => {
                        entry.mark_delivered(now);
                        report.delivered += 1;
                    }
                    Err(err) => {
                        match entry.record_failure(err.to_string(), now, &self.policy) {
                            RetryDecision::Retry { attempt, retry_at } => {
                                warn!(
                                    notification = %entry.id,
                                    template = entry.notification.template(),
                                    attempt,
                                    %retry_at,
                                    error = %err,
                                    "delivery failed; retry scheduled"
                                );
                                report.retried += 1;
                            }
                            RetryDecision::Exhausted { attempts } => {
                                error!(
                                    notification = %entry.id,
                                    template = entry.notification.template(),
                                    attempts,
                                    error = %err,
                                    "delivery abandoned"
                                );
                                report.failed += 1;
                            }
                        }
                    }
                },
                Ok(None) => {
                    debug!(
                        notification = %entry.id,
                        template = entry.notification.template(),
                        "nothing to deliver"
                    );
                    entry.mark_delivered(now);
                    report.skipped += 1;
                }
                Err(RenderError::Missing { kind, id }) => {
                    warn!(
                        notification = %entry.id,
                        kind,
                        id = %id,
                        "referenced document missing; dead-lettering"
                    );
                    entry.dead_letter(format!("{kind} {id} not found"));
                    report.failed += 1;
                }
                Err(RenderError::Store(err)) => return Err(err),
            }

            self.persist(entry)?;
        }

        Ok(report)
    }

    fn persist(&self, entry: OutboxEntry) -> Result<(), StoreError> {
        let id = entry.id.clone();
        let mut transaction = Transaction::new();
        transaction.put_notification(entry);

        match self.store.commit(transaction) {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(reason)) => {
                warn!(notification = %id, %reason, "outbox entry changed during dispatch");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
