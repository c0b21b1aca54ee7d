//! Persistent records of the portal: accounts, skills and assessments.

pub mod assessment;
pub mod ids;
pub mod skill;
pub mod user;

pub use assessment::{
    AnswerOption, Assessment, AssessmentPhase, AssessmentStatistics, AssessmentStatus, Question,
    StudentAssessmentView, StudentOptionView, StudentQuestionView, StudentResponse,
    SubmittedAnswer,
};
pub use ids::{AssessmentId, NotificationId, OptionId, QuestionId, SkillId, UserId};
pub use skill::{
    AttendanceRecord, Budget, BudgetStatus, Enrollment, FeedbackEntry, Schedule, Skill,
    SkillStatus, SkillType,
};
pub use user::{ExternalIdentity, Role, StudentType, User, UserSummary};
