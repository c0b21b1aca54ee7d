use chrono::Duration;

use super::common::*;
use crate::domain::{BudgetStatus, SkillStatus, SkillType, StudentType};
use crate::notifications::{DeliveryStatus, Notification};
use crate::store::PortalStore;
use crate::workflows::{BudgetReview, ScheduleUpdate, SkillUpdate, WorkflowError};

#[test]
fn review_is_a_one_way_transition() {
    let fixture = Fixture::new();
    let skill = fixture.pending_skill(SkillType::Day, 10);
    let budgets = fixture.portal.budgets();

    let approved = budgets
        .review_budget(&fixture.team, &skill.id, BudgetReview::approve(), now())
        .expect("approved");
    assert_eq!(approved.budget.status, BudgetStatus::Approved);
    assert_eq!(approved.status, SkillStatus::Active);
    assert_eq!(approved.budget.reviewed_at, Some(now()));

    match budgets.review_budget(&fixture.team, &skill.id, BudgetReview::reject("late"), now()) {
        Err(WorkflowError::InvalidState(message)) => {
            assert_eq!(message, "This budget has already been reviewed");
        }
        other => panic!("expected invalid state, got {other:?}"),
    }

    let stored = fixture.store.skill(&skill.id).expect("read").expect("skill");
    assert_eq!(stored.budget.status, BudgetStatus::Approved);
}

#[test]
fn rejection_requires_a_reason() {
    let fixture = Fixture::new();
    let skill = fixture.pending_skill(SkillType::Day, 10);
    let budgets = fixture.portal.budgets();

    assert!(matches!(
        budgets.review_budget(&fixture.team, &skill.id, BudgetReview::reject("   "), now()),
        Err(WorkflowError::Validation(_))
    ));
    assert_eq!(
        fixture
            .store
            .skill(&skill.id)
            .expect("read")
            .expect("skill")
            .budget
            .status,
        BudgetStatus::Pending
    );

    let rejected = budgets
        .review_budget(
            &fixture.team,
            &skill.id,
            BudgetReview::reject("Venue cost too high"),
            now(),
        )
        .expect("rejected");
    assert_eq!(rejected.budget.status, BudgetStatus::Rejected);
    assert_eq!(
        rejected.budget.rejection_reason.as_deref(),
        Some("Venue cost too high")
    );
    assert_ne!(rejected.status, SkillStatus::Active);
}

#[test]
fn only_skill_team_reviews() {
    let fixture = Fixture::new();
    let skill = fixture.pending_skill(SkillType::Day, 10);

    assert!(matches!(
        fixture
            .portal
            .budgets()
            .review_budget(&fixture.faculty, &skill.id, BudgetReview::approve(), now()),
        Err(WorkflowError::Forbidden(_))
    ));
    assert!(matches!(
        fixture.portal.budgets().review_budget(
            &fixture.team,
            &crate::domain::SkillId::from("skl-missing"),
            BudgetReview::approve(),
            now()
        ),
        Err(WorkflowError::NotFound("Skill"))
    ));
}

#[test]
fn approval_queues_decision_mail_and_start_reminder() {
    let mut fixture = Fixture::new();
    let co_faculty = fixture.extra_faculty();
    let mut submission = submission(SkillType::Day, 10);
    submission.co_faculties = vec![co_faculty.id.clone()];
    let skill = fixture
        .portal
        .budgets()
        .submit_budget(&fixture.faculty, submission, now())
        .expect("submitted");
    assert_eq!(skill.faculty.len(), 2);

    fixture
        .portal
        .budgets()
        .review_budget(&fixture.team, &skill.id, BudgetReview::approve(), now())
        .expect("approved");

    let outbox = fixture.store.notifications().expect("outbox");
    let decisions = outbox
        .iter()
        .filter(|entry| matches!(entry.notification, Notification::BudgetDecision { .. }))
        .count();
    assert_eq!(decisions, 2);

    let reminder = outbox
        .iter()
        .find(|entry| matches!(entry.notification, Notification::SkillReminder { .. }))
        .expect("reminder queued");
    assert_eq!(reminder.deliver_at, skill.schedule.start_date - Duration::days(1));
    assert!(!reminder.is_due(now()));
}

#[test]
fn submission_validates_co_faculty_and_numbers() {
    let mut fixture = Fixture::new();
    let student = fixture.student(StudentType::DayScholar);
    let budgets = fixture.portal.budgets();

    let mut with_student = submission(SkillType::Day, 10);
    with_student.co_faculties = vec![student.id.clone()];
    assert!(matches!(
        budgets.submit_budget(&fixture.faculty, with_student, now()),
        Err(WorkflowError::Validation(_))
    ));

    assert!(matches!(
        budgets.submit_budget(&fixture.faculty, submission(SkillType::Day, 0), now()),
        Err(WorkflowError::Validation(_))
    ));

    let mut inverted = submission(SkillType::Day, 10);
    inverted.end_date = inverted.start_date - Duration::days(1);
    assert!(matches!(
        budgets.submit_budget(&fixture.faculty, inverted, now()),
        Err(WorkflowError::Validation(_))
    ));

    assert!(matches!(
        budgets.submit_budget(&student, submission(SkillType::Day, 10), now()),
        Err(WorkflowError::Forbidden(_))
    ));

    let pending = budgets.pending_budgets(&fixture.team).expect("pending");
    assert!(pending.is_empty());
}

#[test]
fn moving_start_date_replaces_pending_reminder() {
    let fixture = Fixture::new();
    let skill = fixture.active_skill(SkillType::Day, 10);
    let new_start = skill.schedule.start_date + Duration::days(3);

    let updated = fixture
        .portal
        .budgets()
        .update_skill(
            &fixture.faculty,
            &skill.id,
            SkillUpdate {
                name: Some("Advanced robotics".to_string()),
                schedule: Some(ScheduleUpdate {
                    start_date: Some(new_start),
                    ..ScheduleUpdate::default()
                }),
            },
            now(),
        )
        .expect("updated");
    assert_eq!(updated.name, "Advanced robotics");
    assert_eq!(updated.schedule.start_date, new_start);

    let reminders: Vec<_> = fixture
        .store
        .notifications()
        .expect("outbox")
        .into_iter()
        .filter(|entry| matches!(entry.notification, Notification::SkillReminder { .. }))
        .collect();
    assert_eq!(reminders.len(), 2);
    assert_eq!(
        reminders
            .iter()
            .filter(|entry| entry.status == DeliveryStatus::Cancelled)
            .count(),
        1
    );
    let live = reminders
        .iter()
        .find(|entry| entry.status == DeliveryStatus::Pending)
        .expect("live reminder");
    assert_eq!(live.deliver_at, new_start - Duration::days(1));
}

#[test]
fn students_do_not_see_review_notes() {
    let mut fixture = Fixture::new();
    let skill = fixture.pending_skill(SkillType::Day, 10);
    fixture
        .portal
        .budgets()
        .review_budget(&fixture.team, &skill.id, BudgetReview::reject("Too costly"), now())
        .expect("rejected");
    let student = fixture.student(StudentType::DayScholar);

    let as_student = fixture
        .portal
        .budgets()
        .skill_details(&student, &skill.id)
        .expect("details");
    assert_eq!(as_student.budget.rejection_reason, None);

    let as_faculty = fixture
        .portal
        .budgets()
        .skill_details(&fixture.faculty, &skill.id)
        .expect("details");
    assert_eq!(
        as_faculty.budget.rejection_reason.as_deref(),
        Some("Too costly")
    );
    assert_eq!(
        fixture
            .portal
            .budgets()
            .my_skills(&fixture.faculty)
            .expect("mine")
            .len(),
        1
    );
}
