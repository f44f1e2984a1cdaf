//! Notifications and where they go.
//!
//! [`notification_for`] turns a [`PushEvent`] into a [`Notification`];
//! [`unread_notification`] does the same for a conversation with unread
//! messages. A [`Notifier`] shows them.

use async_trait::async_trait;
use kahla_api::{FriendSummary, avatar_url};
use kahla_core::constants::TITLE_SUFFIX;
use kahla_core::{Event, KahlaUser};
use kahla_pusher::{MessageBody, PushEvent};
use tracing::info;

use crate::errors::NotifyError;

/// A notification ready to show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Avatar to show next to the notification.
    pub icon_url: Option<String>,
}

/// Shows notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show one notification.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier that writes each notification to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            title = %notification.title,
            icon = notification.icon_url.as_deref().unwrap_or(""),
            "{}",
            notification.body
        );
        Ok(())
    }
}

/// Notification for a push event, `None` for messages the user sent or muted.
pub fn notification_for(push: &PushEvent, oss_url: &str) -> Option<Notification> {
    let icon = |user: &KahlaUser| Some(avatar_url(oss_url, user.head_img_file_key));
    let notification = match &push.event {
        Event::NewMessage(e) => {
            if e.sent_by_me || e.muted {
                return None;
            }
            Notification {
                title: format!("{} {TITLE_SUFFIX}", e.sender.display_name()),
                body: push
                    .body
                    .as_ref()
                    .map_or_else(|| e.content.clone(), |body| body.text().to_string()),
                icon_url: icon(&e.sender),
            }
        }
        Event::NewFriendRequest(_) => Notification {
            title: "Friend request".to_string(),
            body: "You have got a new friend request!".to_string(),
            icon_url: None,
        },
        Event::WereDeleted(e) => Notification {
            title: "Were deleted".to_string(),
            body: "You were deleted by one of your friends from his friend list.".to_string(),
            icon_url: e.trigger.as_ref().and_then(icon),
        },
        Event::FriendAccepted(e) => Notification {
            title: "Friend request".to_string(),
            body: "Your friend request was accepted!".to_string(),
            icon_url: e.target.as_ref().and_then(icon),
        },
        Event::TimerUpdated(e) => Notification {
            title: format!("Timer updated {TITLE_SUFFIX}"),
            body: format!(
                "Messages in conversation {} now disappear after {} seconds.",
                e.conversation_id, e.new_timer
            ),
            icon_url: None,
        },
        Event::NewMember(e) => Notification {
            title: format!("New member {TITLE_SUFFIX}"),
            body: format!("{} joined the group.", e.new_member.display_name()),
            icon_url: icon(&e.new_member),
        },
        Event::SomeoneLeft(e) => Notification {
            title: format!("Member left {TITLE_SUFFIX}"),
            body: format!("{} left the group.", e.left_user.display_name()),
            icon_url: icon(&e.left_user),
        },
        Event::Dissolve(e) => Notification {
            title: format!("Group dissolved {TITLE_SUFFIX}"),
            body: format!("Group conversation {} was dissolved.", e.conversation_id),
            icon_url: None,
        },
    };
    Some(notification)
}

/// Notification summarizing a conversation with unread messages.
///
/// `None` when nothing is unread or the conversation is muted.
pub fn unread_notification(friend: &FriendSummary, oss_url: &str) -> Option<Notification> {
    if friend.un_read_amount == 0 || friend.muted {
        return None;
    }
    let body = MessageBody::decrypt(&friend.latest_message, &friend.aes_key);
    Some(Notification {
        title: format!(
            "[{} unread] {} {TITLE_SUFFIX}",
            friend.un_read_amount, friend.display_name
        ),
        body: body.text().to_string(),
        icon_url: Some(avatar_url(oss_url, friend.display_image_key)),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
