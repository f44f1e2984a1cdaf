//! The client runner: login, unread summary, push loop, dispatch.
//!
//! ```text
//! retry(login) ──► spawn unread summary
//!              ──► spawn dispatch (events ──► Notifier)
//!              ──► retry(init_pusher ──► retry(connect))
//! ```
//!
//! The push loop runs until `cancel` fires or a retry budget is spent. A
//! clean close by the server counts as a failed connect attempt, so the
//! channel is reopened.

use std::sync::Arc;

use kahla_api::{ApiError, KahlaApi};
use kahla_core::retry::{RetryConfig, RetryPolicy, retry};
use kahla_pusher::{
    Dialer, PushSession, SessionChannels, SessionConfig, SessionState, TracingObserver,
    TungsteniteDialer,
};
use kahla_settings::{KahlaSettings, PusherSettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::RunError;
use crate::notifier::{LogNotifier, Notification, Notifier, notification_for, unread_notification};

/// A logged-in notifier for one Kahla account.
pub struct Client<D = TungsteniteDialer> {
    settings: KahlaSettings,
    api: KahlaApi,
    session: PushSession<D>,
    channels: SessionChannels,
    notifier: Arc<dyn Notifier>,
}

impl Client<TungsteniteDialer> {
    /// Client over real WebSockets that logs its notifications.
    pub fn new(settings: KahlaSettings) -> Result<Self, RunError> {
        let api = KahlaApi::new(settings.server_url.as_str())?;
        Ok(Self::with_parts(
            settings,
            api,
            TungsteniteDialer,
            Arc::new(LogNotifier),
        ))
    }
}

impl<D: Dialer> Client<D> {
    /// Client with an injected API client, dialer and notifier.
    pub fn with_parts(
        settings: KahlaSettings,
        api: KahlaApi,
        dialer: D,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (session, channels) = PushSession::new(
            dialer,
            session_config(&settings.pusher),
            Arc::new(TracingObserver),
        );
        Self {
            settings,
            api,
            session,
            channels,
            notifier,
        }
    }

    /// Run until `cancel` fires or a retry budget is spent.
    ///
    /// Returns `Ok` after cancellation, including cancellation during a
    /// backoff wait.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), RunError> {
        let Self {
            settings,
            api,
            session,
            channels,
            notifier,
        } = self;
        let api = Arc::new(api);

        let login_policy = RetryPolicy::from_config("login", &settings.retry.login)
            .retry_if(ApiError::is_retryable)
            .with_cancel(cancel.clone());
        match retry(&login_policy, || api.login(&settings.email, &settings.password)).await {
            Ok(()) => info!(email = %settings.email, "logged in"),
            Err(_) if cancel.is_cancelled() => return Ok(()),
            Err(error) => return Err(error.into()),
        }

        let background = cancel.child_token();
        let summary = settings.notify_unread.then(|| {
            tokio::spawn(notify_unread(
                Arc::clone(&api),
                settings.retry.friends.clone(),
                settings.oss_url.clone(),
                Arc::clone(&notifier),
                background.clone(),
            ))
        });
        let dispatcher = tokio::spawn(dispatch(
            channels,
            Arc::clone(&notifier),
            settings.oss_url.clone(),
        ));

        let push_policy = RetryPolicy::from_config("init_pusher", &settings.retry.init_pusher)
            .retry_if(|error: &RunError| !error.is_fatal())
            .with_cancel(cancel.clone());
        let result = {
            let (api, session, settings, cancel) = (&*api, &session, &settings, &cancel);
            retry(&push_policy, move || {
                serve_push_channel(api, session, settings, cancel)
            })
            .await
        };

        session.close();
        // the dispatcher drains what is left once the session's senders are gone
        drop(session);
        background.cancel();
        if let Some(summary) = summary {
            let _ = summary.await;
        }
        let _ = dispatcher.await;

        match result {
            Ok(()) => Ok(()),
            Err(error) if cancel.is_cancelled() => {
                debug!(%error, "push loop stopped by shutdown");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

impl<D> std::fmt::Debug for Client<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_url", &self.api.server_url())
            .field("email", &self.settings.email)
            .finish_non_exhaustive()
    }
}

/// Session parameters from settings.
pub fn session_config(pusher: &PusherSettings) -> SessionConfig {
    SessionConfig {
        heartbeat_interval: pusher.heartbeat_interval(),
        close_grace: pusher.close_grace(),
        event_buffer: pusher.event_buffer,
        ..SessionConfig::default()
    }
}

/// Get a push channel and keep a socket on it.
///
/// An expired login is renewed once before giving up on the channel.
async fn serve_push_channel<D: Dialer>(
    api: &KahlaApi,
    session: &PushSession<D>,
    settings: &KahlaSettings,
    cancel: &CancellationToken,
) -> Result<(), RunError> {
    let channel = match api.init_pusher().await {
        Err(error) if error.is_unauthorized() => {
            warn!(%error, "login expired, signing in again");
            api.login(&settings.email, &settings.password).await?;
            api.init_pusher().await?
        }
        other => other?,
    };
    info!(channel_id = channel.channel_id, "push channel assigned");

    let url = channel.server_path.as_str();
    let policy =
        RetryPolicy::from_config("connect", &settings.retry.connect).with_cancel(cancel.clone());
    retry(&policy, move || async move {
        session.connect(url, cancel).await?;
        match session.state() {
            SessionState::Disconnected => Err(RunError::PeerClosed),
            _ => Ok(()),
        }
    })
    .await
}

/// Notify once per conversation with unread messages.
async fn notify_unread(
    api: Arc<KahlaApi>,
    config: RetryConfig,
    oss_url: String,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) {
    let policy = RetryPolicy::from_config("my_friends", &config)
        .retry_if(ApiError::is_retryable)
        .with_cancel(cancel.clone());
    let friends = tokio::select! {
        result = retry(&policy, || api.my_friends()) => result,
        () = cancel.cancelled() => return,
    };
    let friends = match friends {
        Ok(friends) => friends,
        Err(error) => {
            warn!(%error, "could not load unread conversations");
            return;
        }
    };

    let unread: Vec<Notification> = friends
        .iter()
        .filter_map(|friend| unread_notification(friend, &oss_url))
        .collect();
    info!(conversations = unread.len(), "unread summary");
    for notification in &unread {
        deliver(notifier.as_ref(), notification).await;
    }
}

/// Turn session output into notifications until both channels close.
async fn dispatch(mut channels: SessionChannels, notifier: Arc<dyn Notifier>, oss_url: String) {
    loop {
        tokio::select! {
            Some(push) = channels.events.recv() => {
                if let Some(notification) = notification_for(&push, &oss_url) {
                    deliver(notifier.as_ref(), &notification).await;
                } else {
                    debug!(kind = push.event.kind().name(), "event not notified");
                }
            }
            Some(fault) = channels.faults.recv() => {
                debug!(code = fault.error.code(), excerpt = %fault.excerpt, "frame dropped");
            }
            else => break,
        }
    }
}

async fn deliver(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(error) = notifier.notify(notification).await {
        warn!(%error, title = %notification.title, "notification failed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
