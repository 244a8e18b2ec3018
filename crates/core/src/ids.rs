use serde::{Deserialize, Serialize};

use crate::error::CoreError;

macro_rules! string_newtype {
    ($name:ident, $empty:expr) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Builds the identifier, rejecting empty or whitespace-only input.
            pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
                let s = s.into();
                if s.trim().is_empty() {
                    return Err($empty);
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(SubjectId, CoreError::EmptySubject);
string_newtype!(TaskKey, CoreError::EmptyTaskKey);

impl SubjectId {
    /// Subject shared by every caller authenticated with the static key.
    pub fn shared_key() -> Self {
        Self("_api_key".to_string())
    }

    /// Subject used when no credential scheme is configured at all.
    pub fn dev() -> Self {
        Self("_dev".to_string())
    }
}

/// Storage identifier of a task row. Distinct from the externally visible [`TaskKey`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub i64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
