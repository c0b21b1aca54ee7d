use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::{ExternalIdentity, Role, Skill, SkillType, StudentType, User};
use crate::store::InMemoryStore;
use crate::workflows::{
    BudgetReview, BudgetSubmission, OptionDraft, QuestionDraft, SkillPortal, WorkflowSettings,
};

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) struct Fixture {
    pub portal: SkillPortal<InMemoryStore>,
    pub store: Arc<InMemoryStore>,
    pub team: User,
    pub faculty: User,
    sequence: u32,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(WorkflowSettings::default())
    }

    pub fn with_settings(settings: WorkflowSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let portal = SkillPortal::new(store.clone(), settings);
        let team = portal
            .identity()
            .provision_with_role(identity("team"), Role::SkillTeam, None, now())
            .expect("team account");
        let faculty = portal
            .identity()
            .provision_with_role(identity("faculty"), Role::Faculty, None, now())
            .expect("faculty account");

        Self {
            portal,
            store,
            team,
            faculty,
            sequence: 0,
        }
    }

    pub fn student(&mut self, student_type: StudentType) -> User {
        self.sequence += 1;
        self.portal
            .identity()
            .provision_with_role(
                identity(&format!("student{}", self.sequence)),
                Role::Student,
                Some(student_type),
                now(),
            )
            .expect("student account")
    }

    pub fn extra_faculty(&mut self) -> User {
        self.sequence += 1;
        self.portal
            .identity()
            .provision_with_role(
                identity(&format!("faculty{}", self.sequence)),
                Role::Faculty,
                None,
                now(),
            )
            .expect("faculty account")
    }

    pub fn pending_skill(&self, skill_type: SkillType, capacity: u32) -> Skill {
        self.portal
            .budgets()
            .submit_budget(&self.faculty, submission(skill_type, capacity), now())
            .expect("budget submitted")
    }

    pub fn active_skill(&self, skill_type: SkillType, capacity: u32) -> Skill {
        let skill = self.pending_skill(skill_type, capacity);
        self.portal
            .budgets()
            .review_budget(&self.team, &skill.id, BudgetReview::approve(), now())
            .expect("budget approved")
    }

    /// Reloads the account so its enrolled skills are current.
    pub fn refresh(&self, user: &User) -> User {
        self.portal.identity().user(&user.id).expect("user exists")
    }
}

pub(super) fn identity(handle: &str) -> ExternalIdentity {
    ExternalIdentity {
        google_id: format!("google-{handle}"),
        email: format!("{handle}@bitsathy.ac.in"),
        name: handle.to_string(),
    }
}

pub(super) fn submission(skill_type: SkillType, capacity: u32) -> BudgetSubmission {
    BudgetSubmission {
        name: format!("{skill_type} robotics"),
        skill_type,
        number_of_venues: 1,
        number_of_students: capacity,
        amount: 25_000.0,
        co_faculties: Vec::new(),
        start_date: now() + Duration::days(7),
        end_date: now() + Duration::days(37),
        venue: "Mechatronics Lab".to_string(),
    }
}

pub(super) fn question(text: &str, correct: &str, wrong: &str) -> QuestionDraft {
    QuestionDraft {
        text: text.to_string(),
        options: vec![
            OptionDraft {
                text: correct.to_string(),
                is_correct: true,
            },
            OptionDraft {
                text: wrong.to_string(),
                is_correct: false,
            },
        ],
        points: 1,
    }
}
