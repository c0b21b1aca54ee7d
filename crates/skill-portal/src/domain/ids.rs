use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

document_id!(
    /// Identifier of a portal account.
    UserId,
    "usr"
);
document_id!(
    /// Identifier of a skill course.
    SkillId,
    "skl"
);
document_id!(
    /// Identifier of an assessment attached to a skill.
    AssessmentId,
    "asm"
);
document_id!(QuestionId, "qst");
document_id!(OptionId, "opt");
document_id!(
    /// Identifier of an outbox notification record.
    NotificationId,
    "ntf"
);
