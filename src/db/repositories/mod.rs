//! Database repositories
//!
//! One repository per entity. Each exposes an `async_trait` interface and a
//! `Sqlx*` implementation over `DynDatabasePool`.

pub mod assignment;
pub mod content;
pub mod review_log;
pub mod session;
pub mod user;

pub use assignment::{AssignmentRepository, SqlxAssignmentRepository};
pub use content::{ContentRepository, SqlxContentRepository};
pub use review_log::{ReviewLogRepository, SqlxReviewLogRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
