//! Client runner against a mock REST server and in-memory push sockets.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use kahla_api::{ApiError, KahlaApi};
use kahla_core::cryptojs;
use kahla_notify::{Client, Notification, Notifier, NotifyError, RunError};
use kahla_pusher::testing::MemoryDialer;
use kahla_settings::KahlaSettings;
use parking_lot::Mutex;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PUSH_URL: &str = "wss://push.test/Listen/Channel?Id=1&Key=k";

#[derive(Default)]
struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn titles(&self) -> Vec<String> {
        self.shown.lock().iter().map(|n| n.title.clone()).collect()
    }

    async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.shown.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.shown.lock().push(notification.clone());
        Ok(())
    }
}

fn settings(server: &MockServer) -> KahlaSettings {
    let mut settings = KahlaSettings {
        email: "me@example.com".to_string(),
        password: "secret".to_string(),
        server_url: server.uri(),
        oss_url: "https://oss.test".to_string(),
        notify_unread: false,
        ..KahlaSettings::default()
    };
    settings.pusher.close_grace_ms = 50;
    for config in [
        &mut settings.retry.login,
        &mut settings.retry.friends,
        &mut settings.retry.init_pusher,
        &mut settings.retry.connect,
    ] {
        config.base_delay_ms = 0;
    }
    settings
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/Auth/AuthByPassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "Auth success."
        })))
        .mount(server)
        .await;
}

fn init_pusher_body() -> serde_json::Value {
    json!({
        "code": 0,
        "message": "Successfully get your channel.",
        "serverPath": PUSH_URL,
        "channelId": 1,
        "connectKey": "k"
    })
}

async fn mount_init_pusher(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/Auth/InitPusher"))
        .respond_with(ResponseTemplate::new(200).set_body_json(init_pusher_body()))
        .mount(server)
        .await;
}

fn start(
    settings: KahlaSettings,
    dialer: &Arc<MemoryDialer>,
    notifier: &Arc<RecordingNotifier>,
    cancel: &CancellationToken,
) -> JoinHandle<Result<(), RunError>> {
    let api = KahlaApi::new(settings.server_url.as_str()).unwrap();
    let client = Client::with_parts(settings, api, Arc::clone(dialer), notifier.clone());
    tokio::spawn(client.run(cancel.clone()))
}

fn new_message(text: &str) -> String {
    json!({
        "type": 0,
        "conversationId": 3,
        "content": cryptojs::encrypt(text, "conv-key"),
        "aesKey": "conv-key",
        "sender": {"id": "u1", "nickName": "Alice", "headImgFileKey": 42}
    })
    .to_string()
}

#[tokio::test]
async fn login_summary_and_push_notifications() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_init_pusher(&server).await;
    Mock::given(method("GET"))
        .and(path("/friendship/MyFriends"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "",
            "items": [
                {
                    "displayName": "Team",
                    "displayImageKey": 5,
                    "latestMessage": cryptojs::encrypt("lunch?", "team-key"),
                    "aesKey": "team-key",
                    "unReadAmount": 2,
                    "conversationId": 9,
                    "discriminator": "GroupConversation"
                },
                {"displayName": "Quiet", "unReadAmount": 0}
            ]
        })))
        .mount(&server)
        .await;

    let dialer = Arc::new(MemoryDialer::new());
    let peer = dialer.push_socket();
    let notifier = Arc::new(RecordingNotifier::default());
    let cancel = CancellationToken::new();
    let settings = KahlaSettings {
        notify_unread: true,
        ..settings(&server)
    };
    let run = start(settings, &dialer, &notifier, &cancel);

    assert!(peer.send_text(new_message("hi from alice")));
    notifier.wait_for(2).await;

    let mut titles = notifier.titles();
    titles.sort();
    assert_eq!(titles, ["Alice [Kahla]", "[2 unread] Team [Kahla]"]);
    let bodies: Vec<String> = notifier.shown.lock().iter().map(|n| n.body.clone()).collect();
    assert!(bodies.contains(&"hi from alice".to_string()));
    assert!(bodies.contains(&"lunch?".to_string()));

    cancel.cancel();
    run.await.unwrap().unwrap();
    assert_eq!(dialer.dialed(), [PUSH_URL]);
}

#[tokio::test]
async fn server_close_reconnects() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_init_pusher(&server).await;

    let dialer = Arc::new(MemoryDialer::new());
    let mut first = dialer.push_socket();
    let second = dialer.push_socket();
    let notifier = Arc::new(RecordingNotifier::default());
    let cancel = CancellationToken::new();
    let run = start(settings(&server), &dialer, &notifier, &cancel);

    assert!(first.send(Ok(Message::Close(None))));
    first.hang_up();
    assert!(second.send_text(r#"{"type":1,"requesterId":"r1"}"#));
    notifier.wait_for(1).await;

    assert_eq!(notifier.titles(), ["Friend request"]);
    assert_eq!(dialer.attempts(), 2);

    cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn wrong_password_stops_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Auth/AuthByPassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -1,
            "message": "Wrong password!"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dialer = Arc::new(MemoryDialer::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let run = start(settings(&server), &dialer, &notifier, &CancellationToken::new());

    let err = run.await.unwrap().unwrap_err();
    assert_matches!(err, RunError::Api(ApiError::Application { code: -1, .. }));
    assert_eq!(dialer.attempts(), 0);
}

#[tokio::test]
async fn expired_login_is_renewed_before_init_pusher() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Auth/AuthByPassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": ""})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Auth/InitPusher"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -8,
            "message": "You are unauthorized to access this API."
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_init_pusher(&server).await;

    let dialer = Arc::new(MemoryDialer::new());
    let peer = dialer.push_socket();
    let notifier = Arc::new(RecordingNotifier::default());
    let cancel = CancellationToken::new();
    let run = start(settings(&server), &dialer, &notifier, &cancel);

    assert!(peer.send_text(r#"{"type":3}"#));
    notifier.wait_for(1).await;
    assert_eq!(dialer.dialed(), [PUSH_URL]);

    cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn rejected_relogin_stops_push_loop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Auth/AuthByPassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": ""})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Auth/AuthByPassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -1,
            "message": "Wrong password!"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Auth/InitPusher"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -8,
            "message": "You are unauthorized to access this API."
        })))
        .mount(&server)
        .await;

    let dialer = Arc::new(MemoryDialer::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let run = start(settings(&server), &dialer, &notifier, &CancellationToken::new());

    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert_matches!(err, RunError::Api(ApiError::Application { code: -1, .. }));

    let logins = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/Auth/AuthByPassword")
        .count();
    assert_eq!(logins, 2);
    assert_eq!(dialer.attempts(), 0);
}

#[tokio::test]
async fn cancel_during_connect_backoff_returns_ok() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_init_pusher(&server).await;

    let mut settings = settings(&server);
    settings.retry.connect.base_delay_ms = 60_000;
    settings.retry.connect.jitter_factor = 0.0;
    // no queued sockets: every dial is refused
    let dialer = Arc::new(MemoryDialer::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let cancel = CancellationToken::new();
    let run = start(settings, &dialer, &notifier, &cancel);

    tokio::time::timeout(Duration::from_secs(5), async {
        while dialer.attempts() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(dialer.attempts(), 1);
}
