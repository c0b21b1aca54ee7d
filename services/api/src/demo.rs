use crate::infra::RecordingMailer;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use skill_portal::domain::{
    ExternalIdentity, Role, SkillType, StudentType, SubmittedAnswer, User,
};
use skill_portal::error::AppError;
use skill_portal::notifications::{NotificationDispatcher, RetryPolicy};
use skill_portal::store::InMemoryStore;
use skill_portal::workflows::{
    AssessmentDraft, AssessmentSubmission, AttendanceSheet, BudgetReview, BudgetSubmission,
    FeedbackSubmission, OptionDraft, QuestionDraft, SkillPortal, WorkflowSettings,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Name of the skill walked through the demo
    #[arg(long, default_value = "Full stack development")]
    pub(crate) skill_name: String,
    /// Reject the budget instead of approving it and stop there
    #[arg(long)]
    pub(crate) reject_budget: bool,
    /// Skip the assessment portion of the demo
    #[arg(long)]
    pub(crate) skip_assessment: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let now = Utc::now();
    let store = Arc::new(InMemoryStore::new());
    let portal = SkillPortal::new(store.clone(), WorkflowSettings::default());
    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = NotificationDispatcher::new(store, mailer.clone(), RetryPolicy::default());

    let team = account(&portal, "skillteam", "Skill Team", Role::SkillTeam, None, now)?;
    let faculty = account(&portal, "priya.r", "Priya R", Role::Faculty, None, now)?;
    let students = [
        account(
            &portal,
            "arun.k",
            "Arun K",
            Role::Student,
            Some(StudentType::Hosteller),
            now,
        )?,
        account(
            &portal,
            "deepa.s",
            "Deepa S",
            Role::Student,
            Some(StudentType::DayScholar),
            now,
        )?,
    ];

    println!("Skill portal demo ({} accounts provisioned)", 2 + students.len());

    let skill = portal.budgets().submit_budget(
        &faculty,
        BudgetSubmission {
            name: args.skill_name.clone(),
            skill_type: SkillType::Day,
            number_of_venues: 1,
            number_of_students: 30,
            amount: 25_000.0,
            co_faculties: Vec::new(),
            start_date: now + Duration::days(2),
            end_date: now + Duration::days(45),
            venue: "Learning Centre 3".to_string(),
        },
        now,
    )?;
    println!(
        "- {} submitted a budget for '{}' ({} seats, Rs {:.0})",
        faculty.name, skill.name, skill.budget.number_of_students, skill.budget.amount
    );

    let review = if args.reject_budget {
        BudgetReview::reject("Venue already booked for this term")
    } else {
        BudgetReview::approve()
    };
    let skill = portal.budgets().review_budget(&team, &skill.id, review, now)?;
    println!(
        "- Skill team review -> budget {:?}, skill {:?}",
        skill.budget.status, skill.status
    );
    if let Some(reason) = &skill.budget.rejection_reason {
        println!("  Rejection reason: {reason}");
        flush_outbox(&dispatcher, &mailer, now)?;
        return Ok(());
    }

    for student in &students {
        match portal.enrollment().register_student(student, &skill.id, now) {
            Ok(_) => println!("- {} enrolled", student.name),
            Err(err) => println!("- {} could not enroll: {}", student.name, err),
        }
    }

    let skill = portal.attendance().mark_attendance(
        &faculty,
        &skill.id,
        AttendanceSheet {
            date: now.date_naive(),
            present_students: vec![students[0].id.clone()],
        },
        now,
    )?;
    println!("- Attendance marked for {} session(s)", skill.attendance.len());
    for row in portal.attendance().attendance_stats(&faculty, &skill.id)? {
        println!(
            "  {}: {:.0}% attendance",
            row.student.name, row.attendance_percentage
        );
    }

    let comments = [
        (5, "Excellent hands-on sessions, very helpful"),
        (3, "Good content but the pace was too fast"),
    ];
    for (student, (rating, comment)) in students.iter().zip(comments) {
        portal.feedback().submit_feedback(
            student,
            &skill.id,
            FeedbackSubmission {
                rating,
                comment: Some(comment.to_string()),
            },
            now,
        )?;
    }
    for analysis in portal.feedback().feedback_analysis(&team)? {
        println!(
            "- Feedback for '{}': {} responses, {:.1} average",
            analysis.skill_name, analysis.total_feedback, analysis.average_rating
        );
        println!(
            "  Themes: {} positive / {} negative",
            analysis.common_themes.positive.len(),
            analysis.common_themes.negative.len()
        );
    }
    let queued = portal
        .feedback()
        .send_feedback_summary(&team, &skill.id, now)?;
    println!("- Feedback summary queued for {queued} faculty member(s)");

    if !args.skip_assessment {
        run_assessment(&portal, &faculty, &students, &skill.id, now)?;
    }

    let statistics = portal.analytics().skill_statistics(&team)?;
    println!("Skill statistics:");
    for row in &statistics.skill_stats {
        println!(
            "  - {}: {} skill(s), {} active, Rs {:.0} budgeted",
            row.skill_type, row.total_skills, row.active_skills, row.total_budget
        );
    }
    for row in &statistics.enrollment_stats {
        println!(
            "  - {}: {} student(s), {:.1} enrolled skills on average",
            row.student_type.label(),
            row.total_students,
            row.avg_enrolled_skills
        );
    }

    flush_outbox(&dispatcher, &mailer, now)
}

fn run_assessment(
    portal: &SkillPortal<InMemoryStore>,
    faculty: &User,
    students: &[User],
    skill_id: &skill_portal::domain::SkillId,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let option = |text: &str, is_correct: bool| OptionDraft {
        text: text.to_string(),
        is_correct,
    };
    let assessment = portal.assessments().create_assessment(
        faculty,
        skill_id,
        AssessmentDraft {
            title: "Week 1 quiz".to_string(),
            description: Some("HTTP and HTML fundamentals".to_string()),
            questions: vec![
                QuestionDraft {
                    text: "Which status code means Not Found?".to_string(),
                    options: vec![option("404", true), option("500", false)],
                    points: 2,
                },
                QuestionDraft {
                    text: "Which tag starts a table row?".to_string(),
                    options: vec![option("<tr>", true), option("<td>", false)],
                    points: 1,
                },
            ],
            duration: 20,
            passing_score: 2,
            start_time: now - Duration::minutes(1),
            end_time: now + Duration::hours(1),
        },
        now,
    )?;
    let assessment = portal
        .assessments()
        .publish_assessment(faculty, &assessment.id, now)?;
    println!(
        "- Assessment '{}' published ({} points, pass at {})",
        assessment.title, assessment.total_points, assessment.passing_score
    );

    for (index, student) in students.iter().enumerate() {
        // first student answers correctly, the second picks the wrong options
        let answers = assessment
            .questions
            .iter()
            .map(|question| SubmittedAnswer {
                question: question.id.clone(),
                selected_option: question
                    .options
                    .iter()
                    .find(|option| option.is_correct == (index == 0))
                    .map(|option| option.id.clone()),
                selected_options: Vec::new(),
            })
            .collect();
        let result = portal.assessments().submit_assessment(
            student,
            &assessment.id,
            AssessmentSubmission { answers },
            now,
        )?;
        println!(
            "  {} scored {}/{} ({})",
            student.name,
            result.score,
            result.total_points,
            if result.passed { "passed" } else { "not passed" }
        );
    }

    let results = portal.assessments().results(faculty, &assessment.id, now)?;
    println!(
        "  Results visible to faculty: {} response(s), phase {:?}",
        results.responses.len(),
        results.phase
    );
    Ok(())
}

fn account(
    portal: &SkillPortal<InMemoryStore>,
    handle: &str,
    name: &str,
    role: Role,
    student_type: Option<StudentType>,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    let user = portal.identity().provision_with_role(
        ExternalIdentity {
            google_id: format!("demo-{handle}"),
            email: format!("{handle}@bitsathy.ac.in"),
            name: name.to_string(),
        },
        role,
        student_type,
        now,
    )?;
    Ok(user)
}

fn flush_outbox(
    dispatcher: &NotificationDispatcher<InMemoryStore, RecordingMailer>,
    mailer: &RecordingMailer,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let report = dispatcher.dispatch_due(now)?;
    println!(
        "Outbox: {} delivered, {} still scheduled",
        report.delivered,
        dispatcher.pending_count()?
    );
    for message in mailer.messages() {
        println!("  -> {} | {}", message.to.join(", "), message.subject);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs {
            skill_name: "Robotics".to_string(),
            ..DemoArgs::default()
        })
        .expect("demo completes");
    }

    #[test]
    fn rejected_budget_stops_the_demo() {
        run_demo(DemoArgs {
            reject_budget: true,
            ..DemoArgs::default()
        })
        .expect("demo completes");
    }
}
