#![forbid(unsafe_code)]

//! Shared models and pure logic for the onboarding progress service.

pub mod api;
pub mod error;
pub mod identity;
pub mod ids;
pub mod model;
pub mod progress;

mod util;

pub use error::CoreError;
pub use identity::{CallerIdentity, TrustLevel};
pub use ids::{SubjectId, TaskId, TaskKey};
pub use model::{CompletionRecord, Employee, Task};
pub use util::{now_ms, title_case};
