//! Code and notification relay
//!
//! A repeating job drains the shared tables: it expires stale verification
//! requests, pushes fresh codes for pending requests and delivers queued
//! notifications. Only rows whose subject has a channel binding are picked
//! up, the rest wait until the subject starts the bot.

use anyhow::Result;
use common::{
    config::AppConfig,
    models::{Notification, NotificationStatus, VerificationRequest},
    notifications::NotificationStore,
    verification::VerificationStore,
};
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::channel::PushChannel;
use crate::messages::{code_message, notification_message};

/// Relay settings
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Time between ticks
    pub poll_interval: Duration,
    /// Rows handled per table and tick
    pub batch_size: i64,
    /// Lifetime of a verification request, `None` disables the sweep
    pub code_ttl: Option<Duration>,
    /// Failed sends after which a notification is given up
    pub max_delivery_attempts: i64,
}

impl From<&AppConfig> for RelaySettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            batch_size: config.poll_batch_size.max(1),
            code_ttl: config.code_ttl(),
            max_delivery_attempts: config.max_delivery_attempts.max(1),
        }
    }
}

/// What a single tick did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub expired: u64,
    pub codes_sent: usize,
    pub codes_failed: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

impl TickReport {
    /// True when the tick found nothing to do
    pub fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

/// Generate a random six digit code
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Relay between the shared tables and a push channel
#[derive(Clone)]
pub struct Relay {
    verification: VerificationStore,
    notifications: NotificationStore,
    channel: Arc<dyn PushChannel>,
    settings: RelaySettings,
    /// Held for the duration of a tick
    running: Arc<Mutex<()>>,
}

impl Relay {
    pub fn new(pool: SqlitePool, channel: Arc<dyn PushChannel>, settings: RelaySettings) -> Self {
        Self {
            verification: VerificationStore::new(pool.clone()),
            notifications: NotificationStore::new(pool),
            channel,
            settings,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Run one pass over both tables
    ///
    /// Returns `None` without doing anything while another tick is still
    /// running.
    pub async fn tick(&self) -> Result<Option<TickReport>> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("Previous relay tick still running, skipping");
            return Ok(None);
        };

        let mut report = TickReport::default();

        if let Some(ttl) = self.settings.code_ttl {
            report.expired = self.verification.expire_stale(ttl).await?;
            if report.expired > 0 {
                info!("Expired {} stale code requests", report.expired);
            }
        }

        self.deliver_codes(&mut report).await?;
        self.deliver_notifications(&mut report).await?;

        Ok(Some(report))
    }

    async fn deliver_codes(&self, report: &mut TickReport) -> Result<()> {
        let batch = self
            .verification
            .deliverable_batch(self.settings.batch_size)
            .await?;

        for (request, chat_id) in batch {
            if self.deliver_code(&request, chat_id).await? {
                report.codes_sent += 1;
            } else {
                report.codes_failed += 1;
            }
        }

        Ok(())
    }

    /// Push a fresh code and record it; `false` when the push failed
    async fn deliver_code(&self, request: &VerificationRequest, chat_id: i64) -> Result<bool> {
        let code = generate_code();
        let text = code_message(&code, request.purpose);

        if let Err(e) = self.channel.send_message(chat_id, &text).await {
            warn!(
                "Failed to send code for request {} to {}: {}",
                request.request_id, request.subject, e
            );
            return Ok(false);
        }

        if self.verification.mark_sent(&request.request_id, &code).await? {
            info!(
                "Sent {} code for request {} to {}",
                request.purpose, request.request_id, request.subject
            );
        } else {
            warn!(
                "Request {} was no longer pending after its code was sent",
                request.request_id
            );
        }
        Ok(true)
    }

    async fn deliver_notifications(&self, report: &mut TickReport) -> Result<()> {
        let batch = self
            .notifications
            .deliverable_batch(self.settings.batch_size)
            .await?;

        for (notification, chat_id) in batch {
            if self.deliver_notification(&notification, chat_id).await? {
                report.notifications_sent += 1;
            } else {
                report.notifications_failed += 1;
            }
        }

        Ok(())
    }

    /// Push a notification and record the outcome; `false` when the push failed
    async fn deliver_notification(&self, notification: &Notification, chat_id: i64) -> Result<bool> {
        let text = notification_message(notification);

        if let Err(e) = self.channel.send_message(chat_id, &text).await {
            warn!(
                "Failed to send notification {} to {}: {}",
                notification.notification_id, notification.subject, e
            );
            let status = self
                .notifications
                .record_failure(
                    notification.notification_id,
                    self.settings.max_delivery_attempts,
                )
                .await?;
            if status == Some(NotificationStatus::Failed) {
                error!(
                    "Notification {} for {} failed permanently",
                    notification.notification_id, notification.subject
                );
            }
            return Ok(false);
        }

        if self
            .notifications
            .mark_sent(notification.notification_id)
            .await?
        {
            info!(
                "Sent {} notification {} to {}",
                notification.kind.as_str(),
                notification.notification_id,
                notification.subject
            );
        }
        Ok(true)
    }

    /// Start the repeating relay job
    ///
    /// The returned scheduler keeps the job alive until it is shut down.
    pub async fn start_polling(&self) -> Result<JobScheduler> {
        let relay = self.clone();
        let interval = self.settings.poll_interval;

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_repeated_async(interval, move |_, _| {
            let relay = relay.clone();
            Box::pin(async move {
                match relay.tick().await {
                    Ok(Some(report)) if !report.is_idle() => {
                        debug!("Relay tick finished: {:?}", report);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Relay tick failed: {}", e);
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started relay polling every {:?}", interval);
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelError;
    use crate::test_support::temp_pool;
    use async_trait::async_trait;
    use common::bindings::BindingStore;
    use common::models::{NotificationKind, Purpose, RequestStatus};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Channel that records messages instead of sending them
    #[derive(Default)]
    struct RecordingChannel {
        sent: StdMutex<Vec<(i64, String)>>,
        failing: AtomicBool,
    }

    impl RecordingChannel {
        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PushChannel for RecordingChannel {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ChannelError::Api("chat not found".to_string()));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn settings() -> RelaySettings {
        RelaySettings {
            poll_interval: Duration::from_secs(1),
            batch_size: 20,
            code_ttl: Some(Duration::from_secs(600)),
            max_delivery_attempts: 3,
        }
    }

    async fn new_relay(settings: RelaySettings) -> (Relay, Arc<RecordingChannel>, SqlitePool) {
        let pool = temp_pool().await;
        let channel = Arc::new(RecordingChannel::default());
        let relay = Relay::new(pool.clone(), channel.clone(), settings);
        (relay, channel, pool)
    }

    async fn tick(relay: &Relay) -> TickReport {
        relay.tick().await.unwrap().expect("tick was not skipped")
    }

    async fn bind(pool: &SqlitePool, subject: &str, chat_id: i64) {
        BindingStore::new(pool.clone())
            .upsert(subject, chat_id, None, None)
            .await
            .unwrap();
    }

    /// Status and attempts of a stored notification
    async fn notification_state(pool: &SqlitePool, notification_id: i64) -> (String, i64) {
        sqlx::query_as("SELECT status, attempts FROM notifications WHERE notification_id = ?1")
            .bind(notification_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_generate_code() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_unbound_requests_wait_for_binding() {
        let (relay, channel, pool) = new_relay(settings()).await;
        let store = VerificationStore::new(pool.clone());
        let request_id = store
            .create("@anna", Purpose::Register, None, false)
            .await
            .unwrap();

        for _ in 0..2 {
            let report = tick(&relay).await;
            assert!(report.is_idle(), "{:?}", report);
        }
        assert!(channel.sent().is_empty());
        let request = store.find(&request_id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Pending);

        BindingStore::new(pool.clone())
            .upsert("@anna", 77, Some("Anna"), None)
            .await
            .unwrap();

        let report = tick(&relay).await;
        assert_eq!(report.codes_sent, 1);

        let request = store.find(&request_id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Sent);
        let code = request.code.unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 77);
        assert!(sent[0].1.contains(&format!("<b>{}</b>", code)));

        // Delivered once only
        let report = tick(&relay).await;
        assert!(report.is_idle());
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_unbound_backlog_does_not_block_bound_subjects() {
        let (relay, channel, pool) = new_relay(RelaySettings {
            batch_size: 3,
            code_ttl: None,
            ..settings()
        })
        .await;
        let store = VerificationStore::new(pool.clone());
        bind(&pool, "@real", 31).await;

        let mut conn = pool.acquire().await.unwrap();
        for n in 0..5 {
            let ghost = format!("@ghost{}", n);
            store
                .create(&ghost, Purpose::Login, None, false)
                .await
                .unwrap();
            NotificationStore::enqueue(&mut conn, &ghost, NotificationKind::Generic, None, None)
                .await
                .unwrap();
        }
        let request_id = store
            .create("@real", Purpose::Login, None, false)
            .await
            .unwrap();
        let notification_id = NotificationStore::enqueue(
            &mut conn,
            "@real",
            NotificationKind::Generic,
            Some("hello"),
            None,
        )
        .await
        .unwrap();
        drop(conn);

        let report = tick(&relay).await;
        assert_eq!(report.codes_sent, 1);
        assert_eq!(report.notifications_sent, 1);

        let request = store.find(&request_id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Sent);
        assert_eq!(notification_state(&pool, notification_id).await.0, "sent");
        assert!(channel.sent().iter().all(|(chat_id, _)| *chat_id == 31));
    }

    #[tokio::test]
    async fn test_failed_send_keeps_request_pending() {
        let (relay, channel, pool) = new_relay(settings()).await;
        let store = VerificationStore::new(pool.clone());
        bind(&pool, "@boris", 5).await;
        let request_id = store
            .create("@boris", Purpose::Login, None, false)
            .await
            .unwrap();

        channel.set_failing(true);
        let report = tick(&relay).await;
        assert_eq!(report.codes_failed, 1);
        let request = store.find(&request_id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.code.is_none());

        channel.set_failing(false);
        let report = tick(&relay).await;
        assert_eq!(report.codes_sent, 1);
    }

    #[tokio::test]
    async fn test_sweep_expires_stale_requests() {
        let (relay, channel, pool) = new_relay(RelaySettings {
            code_ttl: Some(Duration::ZERO),
            ..settings()
        })
        .await;
        let store = VerificationStore::new(pool.clone());
        bind(&pool, "@carol", 9).await;
        let request_id = store
            .create("@carol", Purpose::Register, None, false)
            .await
            .unwrap();

        let report = tick(&relay).await;
        assert_eq!(report.expired, 1);
        assert_eq!(report.codes_sent, 0);
        assert!(channel.sent().is_empty());

        let request = store.find(&request_id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Expired);
    }

    #[tokio::test]
    async fn test_notifications_are_rendered_and_sent_once() {
        let (relay, channel, pool) = new_relay(settings()).await;
        bind(&pool, "@dora", 11).await;

        let mut conn = pool.acquire().await.unwrap();
        let payload = serde_json::json!({"full_name": "Ivanova Anna", "passport_no": "MP1234567"});
        let notification_id = NotificationStore::enqueue(
            &mut conn,
            "@dora",
            NotificationKind::RegistrationSuccess,
            None,
            Some(&payload),
        )
        .await
        .unwrap();
        let unbound_id =
            NotificationStore::enqueue(&mut conn, "@nobody", NotificationKind::Generic, None, None)
                .await
                .unwrap();
        drop(conn);

        let report = tick(&relay).await;
        assert_eq!(report.notifications_sent, 1);

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Ivanova Anna"));
        assert!(sent[0].1.contains("MP1***567"));

        assert_eq!(notification_state(&pool, notification_id).await.0, "sent");
        assert_eq!(notification_state(&pool, unbound_id).await.0, "pending");

        tick(&relay).await;
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_gives_up_after_max_attempts() {
        let (relay, channel, pool) = new_relay(settings()).await;
        bind(&pool, "@emil", 13).await;

        let mut conn = pool.acquire().await.unwrap();
        let notification_id = NotificationStore::enqueue(
            &mut conn,
            "@emil",
            NotificationKind::Generic,
            Some("hello"),
            None,
        )
        .await
        .unwrap();
        // Unbound subjects never use up attempts
        let unbound_id =
            NotificationStore::enqueue(&mut conn, "@ghost", NotificationKind::Generic, None, None)
                .await
                .unwrap();
        drop(conn);

        channel.set_failing(true);
        for _ in 0..3 {
            let report = tick(&relay).await;
            assert_eq!(report.notifications_failed, 1);
        }

        assert_eq!(
            notification_state(&pool, notification_id).await,
            ("failed".to_string(), 3)
        );
        assert_eq!(
            notification_state(&pool, unbound_id).await,
            ("pending".to_string(), 0)
        );

        channel.set_failing(false);
        let report = tick(&relay).await;
        assert_eq!(report.notifications_sent, 0);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let (relay, _channel, _pool) = new_relay(settings()).await;

        let guard = relay.running.lock().await;
        assert!(relay.tick().await.unwrap().is_none());
        drop(guard);

        assert!(relay.tick().await.unwrap().is_some());
    }
}
