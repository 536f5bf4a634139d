//! Services layer - Business logic
//!
//! Services own the review workflow rules and coordinate repositories:
//! - Validating input before anything is written
//! - Ordering dependent writes and reporting partial failures
//! - Queueing notifications without waiting on delivery

pub mod assignment;
pub mod content;
pub mod decision;
pub mod markdown;
pub mod notification;
pub mod queue;
pub mod session;

pub use assignment::{AssignmentService, AssignmentServiceError};
pub use content::{ContentService, ContentServiceError};
pub use decision::{AssignmentUpdate, DecisionError, DecisionOutcome, DecisionService};
pub use markdown::MarkdownRenderer;
pub use notification::{
    LogSender, Notices, Notification, NotificationDispatcher, NotificationSender, Recipient,
    SmtpSender,
};
pub use queue::QueueService;
pub use session::{IdentityAssertion, SessionService, SessionServiceError, SignedIn};
