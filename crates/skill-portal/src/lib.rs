//! Skill course portal: budget review, enrollment, attendance, feedback and
//! assessments for a college skill programme.
//!
//! [`workflows::SkillPortal`] is the entry point for the business rules,
//! [`http::portal_router`] exposes them as a JSON API and
//! [`notifications::NotificationDispatcher`] drains the email outbox.

pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod notifications;
pub mod store;
pub mod telemetry;
pub mod workflows;
