//! Notification dispatch
//!
//! Workflow services hand notices to [`NotificationDispatcher::dispatch`],
//! which never blocks and never fails the caller: the notice is queued on a
//! bounded channel or dropped with a warning. A [`NotificationWorker`]
//! drains the queue, resolves recipients to addresses, and delivers through
//! a [`NotificationSender`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SmtpConfig;
use crate::db::repositories::UserRepository;
use crate::models::{ContentItem, Decision, UserRole};
use crate::services::markdown::html_escape;

/// Who a notice is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// A user, resolved to their email address
    User(String),
    /// A literal address
    Email(String),
    /// Every user holding the role
    Role(UserRole),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: Recipient,
    pub subject: String,
    pub html_body: String,
}

/// Delivery backend
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Delivers over SMTP with lettre.
pub struct SmtpSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from)
            .parse()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .credentials(creds)
            .port(config.port)
            .build();

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Writes notices to the log instead of sending them. Used when SMTP is not
/// configured.
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<()> {
        tracing::info!(to, subject, "Notification (SMTP not configured)");
        Ok(())
    }
}

/// Non-blocking handle for queueing notices.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Create a dispatcher and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Create a dispatcher with a worker already running on the runtime.
    pub fn spawn(
        capacity: usize,
        users: Arc<dyn UserRepository>,
        sender: Arc<dyn NotificationSender>,
    ) -> (Self, JoinHandle<()>) {
        let (dispatcher, rx) = Self::channel(capacity);
        let worker = NotificationWorker::new(rx, users, sender);
        let handle = tokio::spawn(worker.run());
        (dispatcher, handle)
    }

    /// Queue a notice. Returns whether it was accepted; a full or closed
    /// queue drops the notice and logs a warning.
    pub fn dispatch(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    recipient = ?n.recipient,
                    subject = %n.subject,
                    "Notification queue full, dropping notice"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                tracing::warn!(
                    recipient = ?n.recipient,
                    subject = %n.subject,
                    "Notification queue closed, dropping notice"
                );
                false
            }
        }
    }
}

/// Drains the queue until every dispatcher handle is dropped.
pub struct NotificationWorker {
    rx: mpsc::Receiver<Notification>,
    users: Arc<dyn UserRepository>,
    sender: Arc<dyn NotificationSender>,
}

impl NotificationWorker {
    pub fn new(
        rx: mpsc::Receiver<Notification>,
        users: Arc<dyn UserRepository>,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self { rx, users, sender }
    }

    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            self.deliver(&notification).await;
        }
        tracing::debug!("Notification worker stopped");
    }

    async fn deliver(&self, notification: &Notification) {
        let addresses = match self.resolve(&notification.recipient).await {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::warn!(
                    recipient = ?notification.recipient,
                    "Failed to resolve notification recipient: {:#}",
                    e
                );
                return;
            }
        };

        let sends = addresses.iter().map(|to| async move {
            let result = self
                .sender
                .send(to, &notification.subject, &notification.html_body)
                .await;
            (to, result)
        });

        for (to, result) in join_all(sends).await {
            if let Err(e) = result {
                tracing::warn!(to = %to, subject = %notification.subject, "Notification delivery failed: {:#}", e);
            }
        }
    }

    async fn resolve(&self, recipient: &Recipient) -> Result<Vec<String>> {
        match recipient {
            Recipient::Email(address) => Ok(vec![address.clone()]),
            Recipient::User(id) => {
                let user = self
                    .users
                    .get_by_id(id)
                    .await?
                    .with_context(|| format!("Unknown user {}", id))?;
                Ok(vec![user.email])
            }
            Recipient::Role(role) => Ok(self
                .users
                .list_by_role(*role)
                .await?
                .into_iter()
                .map(|u| u.email)
                .collect()),
        }
    }
}

/// Builds the workflow notices.
#[derive(Debug, Clone)]
pub struct Notices {
    site_name: String,
}

impl Notices {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
        }
    }

    fn wrap(&self, paragraphs: &[String]) -> String {
        let mut body = String::new();
        for p in paragraphs {
            body.push_str("<p>");
            body.push_str(p);
            body.push_str("</p>");
        }
        body.push_str(&format!("<p>The {} team</p>", html_escape(&self.site_name)));
        body
    }

    fn note_paragraph(note: Option<&str>) -> Option<String> {
        note.map(|n| format!("Reviewer note: {}", html_escape(n)))
    }

    /// Tell the author how their content was decided.
    pub fn decision(&self, item: &ContentItem, decision: Decision, note: Option<&str>) -> Notification {
        let verdict = match decision {
            Decision::Publish => "has been published",
            Decision::Reject => "was not accepted",
        };
        let mut paragraphs = vec![format!(
            "Your {} \"{}\" {}.",
            item.kind.label(),
            html_escape(&item.title),
            verdict
        )];
        paragraphs.extend(Self::note_paragraph(note));
        Notification {
            recipient: Recipient::User(item.author_id.clone()),
            subject: format!("[{}] \"{}\" {}", self.site_name, item.title, verdict),
            html_body: self.wrap(&paragraphs),
        }
    }

    /// Tell the author a reviewer sent their content back for edits.
    pub fn changes_requested(&self, item: &ContentItem, note: &str) -> Notification {
        let paragraphs = vec![
            format!(
                "A reviewer asked for changes to your {} \"{}\". It is back in your drafts.",
                item.kind.label(),
                html_escape(&item.title)
            ),
            format!("Reviewer note: {}", html_escape(note)),
        ];
        Notification {
            recipient: Recipient::User(item.author_id.clone()),
            subject: format!("[{}] Changes requested on \"{}\"", self.site_name, item.title),
            html_body: self.wrap(&paragraphs),
        }
    }

    /// Tell a guru they have new work.
    pub fn assigned(&self, item: &ContentItem, reviewer_id: &str) -> Notification {
        let paragraphs = vec![format!(
            "You have been asked to review the {} \"{}\".",
            item.kind.label(),
            html_escape(&item.title)
        )];
        Notification {
            recipient: Recipient::User(reviewer_id.to_string()),
            subject: format!("[{}] New review: \"{}\"", self.site_name, item.title),
            html_body: self.wrap(&paragraphs),
        }
    }

    /// Tell admins something is waiting for assignment.
    pub fn submitted(&self, item: &ContentItem) -> Notification {
        let paragraphs = vec![format!(
            "A new {} \"{}\" was submitted and needs a reviewer.",
            item.kind.label(),
            html_escape(&item.title)
        )];
        Notification {
            recipient: Recipient::Role(UserRole::Admin),
            subject: format!("[{}] Submitted for review: \"{}\"", self.site_name, item.title),
            html_body: self.wrap(&paragraphs),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSender;
    use super::*;
    use crate::db::fixtures::{migrated_pool, seed_user};
    use crate::db::repositories::SqlxUserRepository;
    use crate::models::ContentKind;

    fn notice(recipient: Recipient) -> Notification {
        Notification {
            recipient,
            subject: "subject".into(),
            html_body: "<p>body</p>".into(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_full_queue_drops_without_blocking() {
        let (dispatcher, mut rx) = NotificationDispatcher::channel(1);

        assert!(dispatcher.dispatch(notice(Recipient::Email("a@x.io".into()))));
        assert!(!dispatcher.dispatch(notice(Recipient::Email("b@x.io".into()))));

        let queued = super::testing::drain(&mut rx);
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].recipient, Recipient::Email("a@x.io".into()));
    }

    #[tokio::test]
    async fn test_dispatch_closed_queue_reports_false() {
        let (dispatcher, rx) = NotificationDispatcher::channel(4);
        drop(rx);
        assert!(!dispatcher.dispatch(notice(Recipient::Role(UserRole::Admin))));
    }

    #[tokio::test]
    async fn test_worker_resolves_users_and_roles() {
        let pool = migrated_pool().await;
        seed_user(&pool, "author", UserRole::User).await;
        seed_user(&pool, "admin1", UserRole::Admin).await;
        seed_user(&pool, "admin2", UserRole::Admin).await;
        let users = SqlxUserRepository::boxed(pool);
        let sender = Arc::new(RecordingSender::default());

        let (dispatcher, handle) = NotificationDispatcher::spawn(8, users, sender.clone());
        dispatcher.dispatch(notice(Recipient::User("author".into())));
        dispatcher.dispatch(notice(Recipient::Role(UserRole::Admin)));
        dispatcher.dispatch(notice(Recipient::User("ghost".into())));
        dispatcher.dispatch(notice(Recipient::Email("ext@x.io".into())));
        drop(dispatcher);
        handle.await.unwrap();

        let mut to: Vec<String> = sender.sent.lock().await.iter().map(|(t, _)| t.clone()).collect();
        to.sort();
        assert_eq!(
            to,
            vec![
                "admin1@emgurus.test",
                "admin2@emgurus.test",
                "author@emgurus.test",
                "ext@x.io"
            ]
        );
    }

    #[tokio::test]
    async fn test_worker_continues_after_send_failure() {
        let pool = migrated_pool().await;
        let users = SqlxUserRepository::boxed(pool);
        let sender = Arc::new(RecordingSender {
            fail_for: Some("bad@x.io".into()),
            ..Default::default()
        });

        let (dispatcher, handle) = NotificationDispatcher::spawn(8, users, sender.clone());
        dispatcher.dispatch(notice(Recipient::Email("bad@x.io".into())));
        dispatcher.dispatch(notice(Recipient::Email("good@x.io".into())));
        drop(dispatcher);
        handle.await.unwrap();

        let sent = sender.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "good@x.io");
    }

    #[test]
    fn test_decision_notice_escapes_and_targets_author() {
        let mut item = ContentItem::new_draft(
            ContentKind::ExamQuestion,
            "p1".into(),
            "<b>Stem</b>".into(),
            None,
            "b".into(),
            "b".into(),
        );
        item.id = "c1".into();
        let notices = Notices::new("EMGurus");

        let n = notices.decision(&item, Decision::Reject, Some("Needs refs & sources"));
        assert_eq!(n.recipient, Recipient::User("p1".into()));
        assert!(n.subject.starts_with("[EMGurus]"));
        assert!(n.html_body.contains("&lt;b&gt;Stem&lt;/b&gt;"));
        assert!(n.html_body.contains("Needs refs &amp; sources"));
        assert!(n.html_body.contains("exam question"));

        let published = notices.decision(&item, Decision::Publish, None);
        assert!(!published.html_body.contains("Reviewer note"));
    }

    #[test]
    fn test_submitted_notice_goes_to_admins() {
        let item = ContentItem::new_draft(
            ContentKind::BlogPost,
            "p1".into(),
            "Title".into(),
            None,
            "b".into(),
            "b".into(),
        );
        let n = Notices::new("EMGurus").submitted(&item);
        assert_eq!(n.recipient, Recipient::Role(UserRole::Admin));
    }
}
