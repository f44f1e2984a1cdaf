//! Response bodies.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The `code`/`message` pair every Kahla response starts with.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct StatusEnvelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Push channel assignment returned by `GET /Auth/InitPusher`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPusherResponse {
    /// WebSocket URL of the push channel, connect key included.
    pub server_path: String,
    /// Channel identifier.
    #[serde(default)]
    pub channel_id: i64,
    /// Channel secret.
    #[serde(default)]
    pub connect_key: String,
}

/// One conversation entry from `GET /friendship/MyFriends`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FriendSummary {
    /// Friend or group name.
    pub display_name: String,
    /// Object storage key of the avatar.
    pub display_image_key: i64,
    /// Ciphertext of the latest message.
    pub latest_message: String,
    /// Time of the latest message.
    #[serde(deserialize_with = "lenient_time")]
    pub latest_message_time: Option<DateTime<Utc>>,
    /// Messages not yet read.
    pub un_read_amount: u32,
    /// Conversation identifier.
    pub conversation_id: i64,
    /// `"PrivateConversation"` or `"GroupConversation"`.
    pub discriminator: String,
    /// Friend's user id, empty for groups.
    pub user_id: String,
    /// Passphrase for [`latest_message`](Self::latest_message).
    pub aes_key: String,
    /// Whether notifications for the conversation are muted.
    pub muted: bool,
}

impl FriendSummary {
    /// Whether the conversation is a group.
    pub fn is_group(&self) -> bool {
        self.discriminator == "GroupConversation"
    }
}

#[derive(Deserialize)]
pub(crate) struct MyFriendsBody {
    #[serde(default)]
    pub items: Vec<FriendSummary>,
}

/// Accept RFC 3339 timestamps and the server's zone-less form, which is UTC.
fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}

/// Avatar download URL for an object storage key, sized for notifications.
pub fn avatar_url(oss_url: &str, image_key: i64) -> String {
    format!(
        "{}/download/fromkey/{image_key}?w=100&h=100",
        oss_url.trim_end_matches('/')
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn friend_summary_from_server_shape() {
        let json = serde_json::json!({
            "displayName": "Alice",
            "displayImageKey": 42,
            "latestMessage": "U2FsdGVkX18=",
            "latestMessageTime": "2019-05-04T03:02:01.123Z",
            "unReadAmount": 3,
            "conversationId": 7,
            "discriminator": "PrivateConversation",
            "userId": "u-1",
            "aesKey": "k",
            "muted": false,
            "someFutureField": true
        });
        let f: FriendSummary = serde_json::from_value(json).unwrap();
        assert_eq!(f.display_name, "Alice");
        assert_eq!(f.un_read_amount, 3);
        assert!(!f.is_group());
        let t = f.latest_message_time.unwrap();
        assert_eq!((t.year(), t.month(), t.day(), t.hour()), (2019, 5, 4, 3));
    }

    #[test]
    fn zone_less_time_is_utc() {
        let f: FriendSummary =
            serde_json::from_str(r#"{"latestMessageTime": "2020-01-02T03:04:05.6789"}"#).unwrap();
        let t = f.latest_message_time.unwrap();
        assert_eq!((t.hour(), t.minute(), t.second()), (3, 4, 5));
    }

    #[test]
    fn unparseable_or_null_time_is_none() {
        let f: FriendSummary =
            serde_json::from_str(r#"{"latestMessageTime": "yesterday"}"#).unwrap();
        assert!(f.latest_message_time.is_none());
        let f: FriendSummary = serde_json::from_str(r#"{"latestMessageTime": null}"#).unwrap();
        assert!(f.latest_message_time.is_none());
    }

    #[test]
    fn group_discriminator() {
        let f = FriendSummary {
            discriminator: "GroupConversation".to_string(),
            ..FriendSummary::default()
        };
        assert!(f.is_group());
    }

    #[test]
    fn avatar_url_format() {
        assert_eq!(
            avatar_url("https://oss.aiursoft.com/", 12),
            "https://oss.aiursoft.com/download/fromkey/12?w=100&h=100"
        );
    }
}
