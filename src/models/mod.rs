//! Data models
//!
//! Domain entities (users, sessions, content, review assignments, review
//! logs), queue projections, and request inputs.

mod assignment;
mod content;
mod queue;
mod review_log;
mod session;
mod user;

pub use assignment::{AssignmentStatus, AssignmentWithContent, Decision, ReviewAssignment};
pub use content::{
    ContentItem, ContentKind, ContentStatus, CreateContentInput, UpdateContentInput,
};
pub use queue::{QueueAction, QueueAudience, QueueRow, QueueView};
pub use review_log::{ReviewAction, ReviewLog};
pub use session::{Session, SessionContext};
pub use user::{User, UserRole};
