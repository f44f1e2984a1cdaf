//! Push event model and wire decoder.
//!
//! Frames are flat JSON objects: an integer `type` discriminator plus the
//! variant's own fields at the same level. Decoding is two-pass because the
//! shape of the payload depends on a field inside it:
//!
//! 1. parse the envelope (only `type`)
//! 2. map the discriminator to an [`EventKind`]
//! 3. parse the whole frame again as that kind's payload struct
//!
//! Unknown discriminators are a [`DecodeError::InvalidEventType`], never a
//! panic, so a single bad frame cannot take down the read loop.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DecodeError;

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// A Kahla account as embedded in push events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KahlaUser {
    /// Account ID.
    pub id: String,
    /// Display nickname.
    #[serde(default)]
    pub nick_name: String,
    /// Object-storage key of the avatar image.
    #[serde(default)]
    pub head_img_file_key: i64,
    /// Email address, when the user made it public.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the email address is public.
    #[serde(default)]
    pub make_email_public: bool,
    /// Free-form profile text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Self-declared sex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    /// Preferred UI language (the service spells it `preferedLanguage`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefered_language: Option<String>,
    /// Account creation timestamp as sent by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_create_time: Option<String>,
    /// Whether the email address was confirmed.
    #[serde(default)]
    pub email_confirmed: bool,
}

impl KahlaUser {
    /// Nickname, falling back to the account ID when empty.
    pub fn display_name(&self) -> &str {
        if self.nick_name.is_empty() {
            &self.id
        } else {
            &self.nick_name
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Fieldless mirror of [`Event`], one per wire discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `type: 0`
    NewMessage,
    /// `type: 1`
    NewFriendRequest,
    /// `type: 2`
    WereDeleted,
    /// `type: 3`
    FriendAccepted,
    /// `type: 4`
    TimerUpdated,
    /// `type: 5`
    NewMember,
    /// `type: 6`
    SomeoneLeft,
    /// `type: 7`
    Dissolve,
}

impl EventKind {
    /// All kinds in discriminator order.
    pub const ALL: [Self; 8] = [
        Self::NewMessage,
        Self::NewFriendRequest,
        Self::WereDeleted,
        Self::FriendAccepted,
        Self::TimerUpdated,
        Self::NewMember,
        Self::SomeoneLeft,
        Self::Dissolve,
    ];

    /// Look up the kind for a wire discriminator.
    pub fn from_discriminator(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Wire discriminator.
    pub fn discriminator(self) -> i64 {
        match self {
            Self::NewMessage => 0,
            Self::NewFriendRequest => 1,
            Self::WereDeleted => 2,
            Self::FriendAccepted => 3,
            Self::TimerUpdated => 4,
            Self::NewMember => 5,
            Self::SomeoneLeft => 6,
            Self::Dissolve => 7,
        }
    }

    /// Stable name used in logs and decode errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::NewMessage => "NewMessage",
            Self::NewFriendRequest => "NewFriendRequest",
            Self::WereDeleted => "WereDeleted",
            Self::FriendAccepted => "FriendAccepted",
            Self::TimerUpdated => "TimerUpdated",
            Self::NewMember => "NewMember",
            Self::SomeoneLeft => "SomeoneLeft",
            Self::Dissolve => "Dissolve",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// A chat message. `content` is CryptoJS ciphertext keyed by `aes_key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageEvent {
    /// Conversation the message belongs to.
    pub conversation_id: i64,
    /// Author of the message.
    pub sender: KahlaUser,
    /// Base64 `Salted__` ciphertext.
    pub content: String,
    /// Per-conversation passphrase for `content`.
    pub aes_key: String,
    /// Whether the conversation is muted for the receiving user.
    #[serde(default)]
    pub muted: bool,
    /// Whether the receiving user wrote this message on another device.
    #[serde(default)]
    pub sent_by_me: bool,
}

/// Someone asked to become a friend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFriendRequestEvent {
    /// Account ID of the requester.
    pub requester_id: String,
}

/// A friend removed the receiving user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WereDeletedEvent {
    /// The user who triggered the deletion, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<KahlaUser>,
}

/// A friend request sent by the receiving user was accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendAcceptedEvent {
    /// The user who accepted, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<KahlaUser>,
}

/// The self-destruct timer of a conversation changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerUpdatedEvent {
    /// Affected conversation.
    pub conversation_id: i64,
    /// New timer in seconds.
    pub new_timer: u64,
}

/// A member joined a group conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemberEvent {
    /// Affected conversation.
    pub conversation_id: i64,
    /// The member who joined.
    pub new_member: KahlaUser,
}

/// A member left a group conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SomeoneLeftEvent {
    /// Affected conversation.
    pub conversation_id: i64,
    /// The member who left.
    pub left_user: KahlaUser,
}

/// A group conversation was dissolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DissolveEvent {
    /// Affected conversation.
    pub conversation_id: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded push event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// `type: 0`
    NewMessage(NewMessageEvent),
    /// `type: 1`
    NewFriendRequest(NewFriendRequestEvent),
    /// `type: 2`
    WereDeleted(WereDeletedEvent),
    /// `type: 3`
    FriendAccepted(FriendAcceptedEvent),
    /// `type: 4`
    TimerUpdated(TimerUpdatedEvent),
    /// `type: 5`
    NewMember(NewMemberEvent),
    /// `type: 6`
    SomeoneLeft(SomeoneLeftEvent),
    /// `type: 7`
    Dissolve(DissolveEvent),
}

impl Event {
    /// The fieldless kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::NewFriendRequest(_) => EventKind::NewFriendRequest,
            Self::WereDeleted(_) => EventKind::WereDeleted,
            Self::FriendAccepted(_) => EventKind::FriendAccepted,
            Self::TimerUpdated(_) => EventKind::TimerUpdated,
            Self::NewMember(_) => EventKind::NewMember,
            Self::SomeoneLeft(_) => EventKind::SomeoneLeft,
            Self::Dissolve(_) => EventKind::Dissolve,
        }
    }

    /// Wire discriminator.
    pub fn discriminator(&self) -> i64 {
        self.kind().discriminator()
    }

    /// Conversation the event refers to, if any.
    pub fn conversation_id(&self) -> Option<i64> {
        match self {
            Self::NewMessage(e) => Some(e.conversation_id),
            Self::TimerUpdated(e) => Some(e.conversation_id),
            Self::NewMember(e) => Some(e.conversation_id),
            Self::SomeoneLeft(e) => Some(e.conversation_id),
            Self::Dissolve(e) => Some(e.conversation_id),
            Self::NewFriendRequest(_) | Self::WereDeleted(_) | Self::FriendAccepted(_) => None,
        }
    }

    fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::NewMessage(e) => serde_json::to_value(e),
            Self::NewFriendRequest(e) => serde_json::to_value(e),
            Self::WereDeleted(e) => serde_json::to_value(e),
            Self::FriendAccepted(e) => serde_json::to_value(e),
            Self::TimerUpdated(e) => serde_json::to_value(e),
            Self::NewMember(e) => serde_json::to_value(e),
            Self::SomeoneLeft(e) => serde_json::to_value(e),
            Self::Dissolve(e) => serde_json::to_value(e),
        }
    }
}

/// Only the discriminator; everything else is ignored on the first pass.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: i64,
}

/// Decode a raw frame into an [`Event`].
///
/// Anything but a JSON object is a [`DecodeError::MalformedEnvelope`].
pub fn decode_event(raw: impl AsRef<[u8]>) -> Result<Event, DecodeError> {
    let frame: Value = serde_json::from_slice(raw.as_ref()).map_err(DecodeError::MalformedEnvelope)?;
    if !frame.is_object() {
        return Err(DecodeError::MalformedEnvelope(serde::de::Error::custom(
            "expected a JSON object",
        )));
    }
    let envelope = Envelope::deserialize(&frame).map_err(DecodeError::MalformedEnvelope)?;
    let kind = EventKind::from_discriminator(envelope.kind)
        .ok_or(DecodeError::InvalidEventType(envelope.kind))?;

    let event = match kind {
        EventKind::NewMessage => Event::NewMessage(parse_payload(&frame, kind)?),
        EventKind::NewFriendRequest => Event::NewFriendRequest(parse_payload(&frame, kind)?),
        EventKind::WereDeleted => Event::WereDeleted(parse_payload(&frame, kind)?),
        EventKind::FriendAccepted => Event::FriendAccepted(parse_payload(&frame, kind)?),
        EventKind::TimerUpdated => Event::TimerUpdated(parse_payload(&frame, kind)?),
        EventKind::NewMember => Event::NewMember(parse_payload(&frame, kind)?),
        EventKind::SomeoneLeft => Event::SomeoneLeft(parse_payload(&frame, kind)?),
        EventKind::Dissolve => Event::Dissolve(parse_payload(&frame, kind)?),
    };
    Ok(event)
}

fn parse_payload<T: DeserializeOwned>(frame: &Value, kind: EventKind) -> Result<T, DecodeError> {
    T::deserialize(frame).map_err(|source| DecodeError::MalformedPayload {
        variant: kind.name(),
        source,
    })
}

/// Encode an [`Event`] into its flat wire form.
pub fn encode_event(event: &Event) -> Result<String, serde_json::Error> {
    let mut object = Map::new();
    let _ = object.insert("type".into(), Value::from(event.discriminator()));
    if let Value::Object(fields) = event.payload()? {
        object.extend(fields);
    }
    serde_json::to_string(&Value::Object(object))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn alice() -> KahlaUser {
        KahlaUser {
            id: "a1b2".into(),
            nick_name: "Alice".into(),
            head_img_file_key: 1024,
            email: Some("alice@example.com".into()),
            make_email_public: true,
            bio: None,
            sex: None,
            prefered_language: Some("en".into()),
            account_create_time: Some("2019-01-01T00:00:00".into()),
            email_confirmed: true,
        }
    }

    fn one_of_each() -> Vec<Event> {
        vec![
            Event::NewMessage(NewMessageEvent {
                conversation_id: 42,
                sender: alice(),
                content: "U2FsdGVkX18BAgMEBQYHCJmdN2nGT3jyTNUy/nu6BOg=".into(),
                aes_key: "s3cr3t".into(),
                muted: false,
                sent_by_me: true,
            }),
            Event::NewFriendRequest(NewFriendRequestEvent {
                requester_id: "req-7".into(),
            }),
            Event::WereDeleted(WereDeletedEvent {
                trigger: Some(alice()),
            }),
            Event::FriendAccepted(FriendAcceptedEvent {
                target: Some(alice()),
            }),
            Event::TimerUpdated(TimerUpdatedEvent {
                conversation_id: 42,
                new_timer: 3600,
            }),
            Event::NewMember(NewMemberEvent {
                conversation_id: 9,
                new_member: alice(),
            }),
            Event::SomeoneLeft(SomeoneLeftEvent {
                conversation_id: 9,
                left_user: alice(),
            }),
            Event::Dissolve(DissolveEvent { conversation_id: 9 }),
        ]
    }

    // -- round trip --

    #[test]
    fn every_variant_survives_encode_then_decode() {
        for event in one_of_each() {
            let wire = encode_event(&event).unwrap();
            let back = decode_event(wire.as_bytes()).unwrap();
            assert_eq!(back, event, "round trip failed for {}", event.kind());
        }
    }

    #[test]
    fn encoded_frame_is_flat_with_type_field() {
        let event = Event::TimerUpdated(TimerUpdatedEvent {
            conversation_id: 1,
            new_timer: 60,
        });
        let value: Value = serde_json::from_str(&encode_event(&event).unwrap()).unwrap();
        assert_eq!(value["type"], 4);
        assert_eq!(value["conversationId"], 1);
        assert_eq!(value["newTimer"], 60);
    }

    // -- discriminators --

    #[test]
    fn kinds_follow_discriminator_order() {
        for (idx, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.discriminator(), idx as i64);
            assert_eq!(EventKind::from_discriminator(idx as i64), Some(*kind));
        }
        assert_eq!(EventKind::from_discriminator(8), None);
        assert_eq!(EventKind::from_discriminator(-1), None);
    }

    #[test]
    fn unknown_discriminator_is_an_error() {
        let err = decode_event(br#"{"type":99}"#).unwrap_err();
        assert_matches!(err, DecodeError::InvalidEventType(99));
    }

    #[test]
    fn negative_discriminator_is_an_error() {
        let err = decode_event(br#"{"type":-3,"conversationId":1}"#).unwrap_err();
        assert_matches!(err, DecodeError::InvalidEventType(-3));
    }

    // -- envelope --

    #[test]
    fn missing_type_is_malformed_envelope() {
        let err = decode_event(br#"{"conversationId":1}"#).unwrap_err();
        assert_matches!(err, DecodeError::MalformedEnvelope(_));
    }

    #[test]
    fn string_type_is_malformed_envelope() {
        let err = decode_event(br#"{"type":"0"}"#).unwrap_err();
        assert_matches!(err, DecodeError::MalformedEnvelope(_));
    }

    #[test]
    fn non_json_is_malformed_envelope() {
        assert_matches!(
            decode_event(b"hello").unwrap_err(),
            DecodeError::MalformedEnvelope(_)
        );
        assert_matches!(
            decode_event(b"").unwrap_err(),
            DecodeError::MalformedEnvelope(_)
        );
        assert_matches!(
            decode_event(b"[0]").unwrap_err(),
            DecodeError::MalformedEnvelope(_)
        );
        assert_matches!(
            decode_event(b"[7]").unwrap_err(),
            DecodeError::MalformedEnvelope(_)
        );
        assert_matches!(
            decode_event(b"7").unwrap_err(),
            DecodeError::MalformedEnvelope(_)
        );
        assert_matches!(
            decode_event(br#"{"type":"7"}"#).unwrap_err(),
            DecodeError::MalformedEnvelope(_)
        );
    }

    // -- payload --

    #[test]
    fn new_message_without_content_is_malformed_payload() {
        let err = decode_event(br#"{"type":0,"conversationId":1}"#).unwrap_err();
        assert_matches!(
            err,
            DecodeError::MalformedPayload {
                variant: "NewMessage",
                ..
            }
        );
    }

    #[test]
    fn dissolve_with_wrong_field_type_is_malformed_payload() {
        let err = decode_event(br#"{"type":7,"conversationId":"nine"}"#).unwrap_err();
        assert_matches!(
            err,
            DecodeError::MalformedPayload {
                variant: "Dissolve",
                ..
            }
        );
    }

    #[test]
    fn server_shaped_new_message_decodes() {
        let frame = r#"{
            "type": 0,
            "conversationId": 5,
            "sender": {
                "makeEmailPublic": false,
                "email": "bob@example.com",
                "id": "bob-id",
                "bio": null,
                "nickName": "Bob",
                "sex": null,
                "headImgFileKey": 77,
                "preferedLanguage": "zh",
                "accountCreateTime": "2018-06-01T12:00:00",
                "emailConfirmed": true
            },
            "content": "U2FsdGVkX18BAgMEBQYHCJmdN2nGT3jyTNUy/nu6BOg=",
            "aesKey": "s3cr3t",
            "muted": true,
            "sentByMe": false
        }"#;
        let Event::NewMessage(msg) = decode_event(frame).unwrap() else {
            panic!("expected NewMessage");
        };
        assert_eq!(msg.conversation_id, 5);
        assert_eq!(msg.sender.nick_name, "Bob");
        assert_eq!(msg.sender.head_img_file_key, 77);
        assert_eq!(msg.sender.bio, None);
        assert!(msg.muted);
        assert!(!msg.sent_by_me);
    }

    #[test]
    fn bare_were_deleted_and_friend_accepted_decode() {
        assert_eq!(
            decode_event(br#"{"type":2}"#).unwrap(),
            Event::WereDeleted(WereDeletedEvent::default())
        );
        assert_eq!(
            decode_event(br#"{"type":3}"#).unwrap(),
            Event::FriendAccepted(FriendAcceptedEvent::default())
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let event = decode_event(br#"{"type":1,"requesterId":"r","extra":[1,2]}"#).unwrap();
        assert_eq!(
            event,
            Event::NewFriendRequest(NewFriendRequestEvent {
                requester_id: "r".into()
            })
        );
    }

    // -- helpers --

    #[test]
    fn conversation_id_accessor() {
        let events = one_of_each();
        let ids: Vec<_> = events.iter().map(Event::conversation_id).collect();
        assert_eq!(
            ids,
            vec![Some(42), None, None, None, Some(42), Some(9), Some(9), Some(9)]
        );
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let mut user = alice();
        assert_eq!(user.display_name(), "Alice");
        user.nick_name.clear();
        assert_eq!(user.display_name(), "a1b2");
    }

    #[test]
    fn kind_display_matches_name() {
        assert_eq!(EventKind::SomeoneLeft.to_string(), "SomeoneLeft");
    }

    proptest! {
        #[test]
        fn out_of_range_discriminators_never_decode(value in any::<i64>()) {
            prop_assume!(!(0..=7).contains(&value));
            let frame = format!(r#"{{"type":{value}}}"#);
            let is_invalid_type = matches!(
                decode_event(frame.as_bytes()),
                Err(DecodeError::InvalidEventType(v)) if v == value
            );
            prop_assert!(is_invalid_type);
        }

        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_event(&bytes);
        }
    }
}
