//! Transactional outbox for portal e-mail.
//!
//! Workflows stage [`OutboxEntry`] records in the same transaction as the
//! state change that triggers them. [`NotificationDispatcher`] later renders
//! due entries and hands them to a [`Mailer`], retrying with backoff.

mod dispatcher;
mod mailer;
mod outbox;
mod templates;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use mailer::{EmailMessage, LogMailer, MailError, Mailer};
pub use outbox::{DeliveryStatus, Notification, OutboxEntry, RetryDecision, RetryPolicy};
pub use templates::{render, RenderError};
