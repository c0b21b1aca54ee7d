use crate::domain::SkillType;
use crate::store::StoreError;

/// Failure of a portal workflow.
///
/// Every variant except [`WorkflowError::Store`] is operational: the message
/// is meant for the caller and maps to a 4xx status at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Validation(String),
    #[error("This skill is not available for registration")]
    NotAvailable,
    #[error("You are already enrolled in this skill")]
    AlreadyEnrolled,
    #[error("Day scholars can only register for day skills")]
    TypeMismatch,
    #[error("You have reached the maximum limit for {skill_type} skills")]
    LimitReached { skill_type: SkillType },
    #[error("No available slots in this skill")]
    CapacityExceeded,
    #[error("Attendance already marked for this date")]
    DuplicateAttendance,
    #[error("You have already submitted feedback for this skill")]
    DuplicateFeedback,
    #[error("This assessment is not currently active")]
    NotActive,
    #[error("You have already submitted this assessment")]
    AlreadySubmitted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable identifier returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::NotFound(_) => "NOT_FOUND",
            WorkflowError::Forbidden(_) => "FORBIDDEN",
            WorkflowError::InvalidState(_) => "INVALID_STATE",
            WorkflowError::Validation(_) => "VALIDATION_ERROR",
            WorkflowError::NotAvailable => "NOT_AVAILABLE",
            WorkflowError::AlreadyEnrolled => "ALREADY_ENROLLED",
            WorkflowError::TypeMismatch => "TYPE_MISMATCH",
            WorkflowError::LimitReached { .. } => "LIMIT_REACHED",
            WorkflowError::CapacityExceeded => "CAPACITY_EXCEEDED",
            WorkflowError::DuplicateAttendance => "DUPLICATE_ATTENDANCE",
            WorkflowError::DuplicateFeedback => "DUPLICATE_FEEDBACK",
            WorkflowError::NotActive => "NOT_ACTIVE",
            WorkflowError::AlreadySubmitted => "ALREADY_SUBMITTED",
            WorkflowError::Store(StoreError::Conflict(_)) => "CONCURRENT_UPDATE",
            WorkflowError::Store(StoreError::NotFound(_)) => "NOT_FOUND",
            WorkflowError::Store(StoreError::Unavailable(_)) => "STORE_UNAVAILABLE",
        }
    }

    /// Whether the message may be shown to the caller as-is.
    pub fn is_operational(&self) -> bool {
        !matches!(self, WorkflowError::Store(StoreError::Unavailable(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_message_names_the_skill_type() {
        let err = WorkflowError::LimitReached {
            skill_type: SkillType::Night,
        };
        assert_eq!(
            err.to_string(),
            "You have reached the maximum limit for night skills"
        );
        assert_eq!(err.code(), "LIMIT_REACHED");
    }

    #[test]
    fn store_outage_is_not_operational() {
        let err = WorkflowError::from(StoreError::Unavailable("disk full".to_string()));
        assert!(!err.is_operational());
        assert!(WorkflowError::NotFound("Skill").is_operational());
        assert_eq!(WorkflowError::NotFound("Skill").to_string(), "Skill not found");
    }
}
