use super::common::*;
use crate::domain::{SkillType, StudentType};
use crate::store::PortalStore;
use crate::workflows::{WorkflowError, WorkflowSettings};

#[test]
fn registration_stops_at_capacity_without_truncating() {
    let mut fixture = Fixture::new();
    let skill = fixture.active_skill(SkillType::Day, 2);
    let first = fixture.student(StudentType::DayScholar);
    let second = fixture.student(StudentType::DayScholar);
    let third = fixture.student(StudentType::DayScholar);

    let enrollment = fixture.portal.enrollment();
    enrollment
        .register_student(&first, &skill.id, now())
        .expect("first seat");
    enrollment
        .register_student(&second, &skill.id, now())
        .expect("second seat");

    match enrollment.register_student(&third, &skill.id, now()) {
        Err(WorkflowError::CapacityExceeded) => {}
        other => panic!("expected capacity error, got {other:?}"),
    }

    let stored = fixture.store.skill(&skill.id).expect("read").expect("skill");
    assert_eq!(stored.enrolled_students.len(), 2);
    assert!(fixture.refresh(&third).enrolled_skills.is_empty());
}

#[test]
fn day_scholar_cannot_join_night_skill_but_hosteller_can() {
    let mut fixture = Fixture::new();
    let night = fixture.active_skill(SkillType::Night, 10);
    let day_scholar = fixture.student(StudentType::DayScholar);
    let hosteller = fixture.student(StudentType::Hosteller);

    let enrollment = fixture.portal.enrollment();
    match enrollment.register_student(&day_scholar, &night.id, now()) {
        Err(WorkflowError::TypeMismatch) => {}
        other => panic!("expected type mismatch, got {other:?}"),
    }

    let joined = enrollment
        .register_student(&hosteller, &night.id, now())
        .expect("hosteller may join night skills");
    assert!(joined.is_student_enrolled(&hosteller.id));
}

#[test]
fn enrollment_updates_both_documents() {
    let mut fixture = Fixture::new();
    let skill = fixture.active_skill(SkillType::Day, 5);
    let student = fixture.student(StudentType::DayScholar);

    fixture
        .portal
        .enrollment()
        .register_student(&student, &skill.id, now())
        .expect("enrolled");

    let student = fixture.refresh(&student);
    assert_eq!(student.enrolled_skills, vec![skill.id.clone()]);
    let skill = fixture.store.skill(&skill.id).expect("read").expect("skill");
    assert_eq!(skill.enrolled_students[0].student, student.id);
    assert_eq!(skill.enrolled_students[0].enrolled_at, now());
}

#[test]
fn eligibility_failures_are_distinct() {
    let mut fixture = Fixture::new();
    let pending = fixture.pending_skill(SkillType::Day, 5);
    let first_day = fixture.active_skill(SkillType::Day, 5);
    let second_day = fixture.active_skill(SkillType::Day, 5);
    let student = fixture.student(StudentType::DayScholar);
    let enrollment = fixture.portal.enrollment();

    assert!(matches!(
        enrollment.register_student(&student, &pending.id, now()),
        Err(WorkflowError::NotAvailable)
    ));
    assert!(matches!(
        enrollment.register_student(&student, &crate::domain::SkillId::from("skl-missing"), now()),
        Err(WorkflowError::NotFound("Skill"))
    ));

    enrollment
        .register_student(&student, &first_day.id, now())
        .expect("first day skill");
    assert!(matches!(
        enrollment.register_student(&student, &first_day.id, now()),
        Err(WorkflowError::AlreadyEnrolled)
    ));

    match enrollment.register_student(&student, &second_day.id, now()) {
        Err(err @ WorkflowError::LimitReached { .. }) => {
            assert_eq!(
                err.to_string(),
                "You have reached the maximum limit for day skills"
            );
        }
        other => panic!("expected limit error, got {other:?}"),
    }
}

#[test]
fn per_type_limit_is_configurable() {
    let mut fixture = Fixture::with_settings(WorkflowSettings {
        skill_type_limit: 2,
        ..WorkflowSettings::default()
    });
    let first = fixture.active_skill(SkillType::Day, 5);
    let second = fixture.active_skill(SkillType::Day, 5);
    let student = fixture.student(StudentType::DayScholar);

    let enrollment = fixture.portal.enrollment();
    enrollment
        .register_student(&student, &first.id, now())
        .expect("first");
    enrollment
        .register_student(&student, &second.id, now())
        .expect("second allowed under a limit of two");
}

#[test]
fn only_students_register_and_views_follow_student_type() {
    let mut fixture = Fixture::new();
    let day = fixture.active_skill(SkillType::Day, 5);
    let night = fixture.active_skill(SkillType::Night, 5);
    fixture.pending_skill(SkillType::Day, 5);
    let day_scholar = fixture.student(StudentType::DayScholar);
    let hosteller = fixture.student(StudentType::Hosteller);
    let enrollment = fixture.portal.enrollment();

    assert!(matches!(
        enrollment.register_student(&fixture.faculty, &day.id, now()),
        Err(WorkflowError::Forbidden(_))
    ));

    let for_day_scholar = enrollment
        .available_skills(&day_scholar)
        .expect("available");
    assert_eq!(for_day_scholar.len(), 1);
    assert_eq!(for_day_scholar[0].id, day.id);

    let for_hosteller = enrollment.available_skills(&hosteller).expect("available");
    assert_eq!(for_hosteller.len(), 2);

    enrollment
        .register_student(&hosteller, &night.id, now())
        .expect("enrolled");
    let mine = enrollment.enrolled_skills(&hosteller).expect("enrolled skills");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, night.id);
}
