use std::fmt::Write as _;

use super::mailer::EmailMessage;
use super::outbox::{Notification, OutboxEntry};
use crate::domain::{BudgetStatus, Skill, SkillId, User, UserId};
use crate::store::{PortalStore, StoreError};
use crate::workflows::feedback::RatingSummary;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("referenced {kind} {id} no longer exists")]
    Missing { kind: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

const FOOTER: &str = "<p style=\"color:#666;font-size:0.9em\">This is an automated message. Please do not reply to this email.</p>";

/// Renders an outbox entry into a message.
///
/// Returns `Ok(None)` when the notification currently has nobody to reach,
/// such as a reminder for a skill without enrolled students.
pub fn render<S>(entry: &OutboxEntry, store: &S) -> Result<Option<EmailMessage>, RenderError>
where
    S: PortalStore + ?Sized,
{
    match &entry.notification {
        Notification::BudgetDecision {
            skill,
            faculty,
            decision,
            rejection_reason,
        } => {
            let skill = load_skill(store, skill)?;
            let faculty = load_user(store, faculty)?;
            Ok(Some(budget_decision(
                &skill,
                &faculty,
                *decision,
                rejection_reason.as_deref(),
            )))
        }
        Notification::AssessmentPublished {
            assessment,
            student,
        } => {
            let assessment = store
                .assessment(assessment)?
                .ok_or_else(|| RenderError::Missing {
                    kind: "assessment",
                    id: assessment.to_string(),
                })?;
            let student = load_user(store, student)?;

            let mut html = String::new();
            let _ = write!(
                html,
                "<h2>Assessment Notification</h2><p>Dear {},</p>\
                 <p>An assessment has been scheduled for your enrolled skill.</p>\
                 <ul><li><strong>Title:</strong> {}</li>\
                 <li><strong>Start Time:</strong> {}</li>\
                 <li><strong>Closes:</strong> {}</li>\
                 <li><strong>Duration:</strong> {} minutes</li>\
                 <li><strong>Total Points:</strong> {}</li></ul>{FOOTER}",
                student.name,
                assessment.title,
                assessment.start_time.format("%Y-%m-%d %H:%M UTC"),
                assessment.end_time.format("%Y-%m-%d %H:%M UTC"),
                assessment.duration,
                assessment.total_points,
            );

            Ok(Some(EmailMessage {
                to: vec![student.email],
                subject: format!("Assessment Scheduled: {}", assessment.title),
                html,
            }))
        }
        Notification::SkillReminder { skill } => {
            let skill = load_skill(store, skill)?;
            let mut recipients = Vec::with_capacity(skill.enrolled_students.len());
            for enrollment in &skill.enrolled_students {
                if let Some(student) = store.user(&enrollment.student)? {
                    recipients.push(student.email);
                }
            }
            if recipients.is_empty() {
                return Ok(None);
            }

            let mut html = String::new();
            let _ = write!(
                html,
                "<h2>Skill Session Reminder</h2><p>Dear Student,</p>\
                 <p>Your enrolled skill session <strong>{}</strong> starts tomorrow.</p>\
                 <ul><li><strong>Date:</strong> {}</li>\
                 <li><strong>Time:</strong> {}</li>\
                 <li><strong>Venue:</strong> {}</li>\
                 <li><strong>Until:</strong> {}</li></ul>\
                 <p>Please ensure you arrive at the venue on time.</p>{FOOTER}",
                skill.name,
                skill.schedule.start_date.format("%Y-%m-%d"),
                skill.schedule.start_date.format("%H:%M UTC"),
                skill.schedule.venue,
                skill.schedule.end_date.format("%Y-%m-%d"),
            );

            Ok(Some(EmailMessage {
                to: recipients,
                subject: format!("Reminder: {} starts tomorrow", skill.name),
                html,
            }))
        }
        Notification::FeedbackSummary { skill, faculty } => {
            let skill = load_skill(store, skill)?;
            let faculty = load_user(store, faculty)?;
            let summary = RatingSummary::from_entries(&skill.feedback);

            let mut html = String::new();
            let _ = write!(
                html,
                "<h2>Skill Feedback Summary</h2><p>Dear {},</p>\
                 <p>Here's a summary of student feedback for your skill: {}</p>\
                 <ul><li><strong>Average Rating:</strong> {:.1}/5</li>\
                 <li><strong>Total Responses:</strong> {}</li>",
                faculty.name, skill.name, summary.average_rating, summary.total_responses,
            );
            for (rating, count) in &summary.rating_distribution {
                let _ = write!(html, "<li>{rating} stars: {count} responses</li>");
            }
            let _ = write!(html, "</ul>{FOOTER}");

            Ok(Some(EmailMessage {
                to: vec![faculty.email],
                subject: format!("Feedback Summary: {}", skill.name),
                html,
            }))
        }
    }
}

fn budget_decision(
    skill: &Skill,
    faculty: &User,
    decision: BudgetStatus,
    rejection_reason: Option<&str>,
) -> EmailMessage {
    let label = match decision {
        BudgetStatus::Approved => "Approved",
        BudgetStatus::Rejected => "Rejected",
        BudgetStatus::Pending => "Pending",
    };

    let mut html = String::new();
    let _ = write!(
        html,
        "<h2>Budget Review Update</h2><p>Dear {},</p>\
         <p>Your budget submission for skill \"{}\" has been {}.</p>",
        faculty.name,
        skill.name,
        decision.label(),
    );
    match (decision, rejection_reason) {
        (BudgetStatus::Rejected, Some(reason)) => {
            let _ = write!(
                html,
                "<h3>Reason for Rejection:</h3><p>{reason}</p>\
                 <p>Please review and resubmit your budget addressing the above concerns.</p>"
            );
        }
        (BudgetStatus::Approved, _) => {
            html.push_str(
                "<h3>Next Steps:</h3>\
                 <p>You can now proceed with conducting the skill sessions as planned.</p>",
            );
        }
        _ => {}
    }
    let _ = write!(
        html,
        "<p><strong>Budget Details:</strong></p><ul>\
         <li>Number of Venues: {}</li><li>Number of Students: {}</li><li>Amount: {:.2}</li></ul>{FOOTER}",
        skill.budget.number_of_venues, skill.budget.number_of_students, skill.budget.amount,
    );

    EmailMessage {
        to: vec![faculty.email.clone()],
        subject: format!("Budget {label} - {}", skill.name),
        html,
    }
}

fn load_skill<S: PortalStore + ?Sized>(store: &S, id: &SkillId) -> Result<Skill, RenderError> {
    store.skill(id)?.ok_or_else(|| RenderError::Missing {
        kind: "skill",
        id: id.to_string(),
    })
}

fn load_user<S: PortalStore + ?Sized>(store: &S, id: &UserId) -> Result<User, RenderError> {
    store.user(id)?.ok_or_else(|| RenderError::Missing {
        kind: "user",
        id: id.to_string(),
    })
}
