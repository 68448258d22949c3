//! Behavioural tests against an in-process mock of the AHEM REST API.
//!
//! A small stateful fake (`Store`) backs the mailbox routes so that deletes,
//! read-state changes and late arrivals are observable through later calls.

use ahem_helper::wait::{find_first, poll_until_match};
use ahem_helper::{
    AhemClient, Error, HelperConfig, MailHelper, MatchCriteria, WaitOptions,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TOKEN: &str = "test-token";
const BEARER: &str = "Bearer test-token";

// ─────────────────────────────────────────────────────────────────────────────
// Fake mailbox
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Stored {
    id: String,
    subject: String,
    from: String,
    to: String,
    text: String,
    timestamp: i64,
    is_read: bool,
}

impl Stored {
    fn new(id: &str, subject: &str, text: &str) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            from: "noreply@example.com".into(),
            to: "user@inbox.local".into(),
            text: text.into(),
            timestamp: 1_700_000_000_000,
            is_read: false,
        }
    }

    fn to(mut self, to: &str) -> Self {
        self.to = to.into();
        self
    }

    fn summary(&self) -> Value {
        json!({
            "emailId": self.id,
            "subject": self.subject,
            "timestamp": self.timestamp,
            "isRead": self.is_read,
            "sender": { "address": self.from, "name": "Example" }
        })
    }

    fn full(&self) -> Value {
        json!({
            "_id": self.id,
            "subject": self.subject,
            "text": self.text,
            "date": "Tue, 14 Nov 2023 22:13:20 +0000",
            "timestamp": self.timestamp,
            "isRead": self.is_read,
            "attachments": [],
            "from": {
                "value": [{ "address": self.from, "name": "Example" }],
                "text": format!("Example <{}>", self.from),
                "html": ""
            },
            "to": {
                "value": [{ "address": self.to, "name": "" }],
                "text": self.to,
                "html": ""
            },
            "headers": {},
            "headerLines": [],
            "messageId": format!("<{}@example.com>", self.id)
        })
    }
}

#[derive(Debug, Clone, Default)]
struct Store(Arc<Mutex<Vec<Stored>>>);

impl Store {
    fn push(&self, email: Stored) {
        self.0.lock().unwrap().push(email);
    }

    fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    fn is_read(&self, id: &str) -> bool {
        self.0
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.id == id && e.is_read)
    }
}

struct ListEmails {
    store: Store,
    delay: Duration,
}

impl Respond for ListEmails {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let body: Vec<Value> = self.store.0.lock().unwrap().iter().map(Stored::summary).collect();
        ResponseTemplate::new(200)
            .set_body_json(body)
            .set_delay(self.delay)
    }
}

struct EmailById(Store);

impl Respond for EmailById {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request.url.path().rsplit('/').next().unwrap_or_default().to_string();
        let mut emails = self.0 .0.lock().unwrap();
        let Some(position) = emails.iter().position(|e| e.id == id) else {
            return ResponseTemplate::new(404).set_body_string("email not found");
        };

        match request.method.as_str() {
            "GET" => ResponseTemplate::new(200).set_body_json(emails[position].full()),
            "PATCH" => {
                let body: Value = serde_json::from_slice(&request.body).unwrap();
                emails[position].is_read = body["isRead"].as_bool().unwrap();
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true }))
            }
            "DELETE" => {
                emails.remove(position);
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true }))
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test Setup Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": TOKEN })))
        .mount(server)
        .await;
}

async fn fake_server_with_delay(delay: Duration) -> (MockServer, Store) {
    init_tracing();
    let server = MockServer::start().await;
    let store = Store::default();

    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/mailbox/inbox/email"))
        .and(header("Authorization", BEARER))
        .respond_with(ListEmails {
            store: store.clone(),
            delay,
        })
        .mount(&server)
        .await;

    Mock::given(path_regex(r"^/api/mailbox/inbox/email/[^/]+$"))
        .and(header("Authorization", BEARER))
        .respond_with(EmailById(store.clone()))
        .mount(&server)
        .await;

    (server, store)
}

async fn fake_server() -> (MockServer, Store) {
    fake_server_with_delay(Duration::ZERO).await
}

async fn count_requests(server: &MockServer, verb: &str, path_prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path().starts_with(path_prefix))
        .count()
}

fn options(timeout_ms: u64, poll_ms: u64) -> WaitOptions {
    WaitOptions::new("inbox")
        .timeout(Duration::from_millis(timeout_ms))
        .poll_interval(Duration::from_millis(poll_ms))
}

fn config_for(server: &MockServer) -> HelperConfig {
    HelperConfig::builder()
        .base_url(server.uri())
        .default_timeout(Duration::from_secs(1))
        .poll_interval(Duration::from_millis(50))
        .build_with_env(None)
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport Client Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_attaches_bearer_token() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "Welcome", "Hello"));

    let client = AhemClient::new(server.uri()).unwrap();
    let summaries = client.list_summaries("inbox").await.unwrap();

    assert!(client.is_authenticated().await);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].email_id, "e1");
    assert_eq!(summaries[0].sender.address, "noreply@example.com");
}

#[tokio::test]
async fn test_token_cached_until_cleared() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": TOKEN })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/properties"))
        .and(header("Authorization", BEARER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "1.2.0" })))
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let props = client.properties().await.unwrap();
    assert_eq!(props["version"], "1.2.0");

    // Cached: no second handshake
    client.properties().await.unwrap();

    client.clear_token().await;
    assert!(!client.is_authenticated().await);
    client.properties().await.unwrap();
}

#[tokio::test]
async fn test_clones_share_the_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": TOKEN })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    client.authenticate().await.unwrap();

    let clone = client.clone();
    assert!(clone.is_authenticated().await);
}

#[tokio::test]
async fn test_custom_auth_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": TOKEN })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AhemClient::builder(server.uri())
        .auth_path("/api/auth/authenticate")
        .build()
        .unwrap();
    client.authenticate().await.unwrap();
}

#[tokio::test]
async fn test_auth_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let err = client.list_summaries("inbox").await.unwrap_err();

    match err {
        Error::Auth { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "nope");
        }
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_auth_without_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::MissingToken));
}

#[tokio::test]
async fn test_non_2xx_carries_status_and_body() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/mailbox/inbox/email/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("email not found"))
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let err = client.get_full("inbox", "missing").await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.status(), Some(404));
    assert!(matches!(err, Error::Status { ref body, .. } if body == "email not found"));
}

#[tokio::test]
async fn test_malformed_json() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/mailbox/inbox/email"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let err = client.list_summaries("inbox").await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_mailbox_name_is_percent_encoded() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/mailbox/team%20inbox/email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/mailbox/team%20inbox"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    assert!(client.list_summaries("team inbox").await.unwrap().is_empty());
    client.delete_mailbox("team inbox").await.unwrap();
}

#[tokio::test]
async fn test_list_mailbox_names() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/mailbox/autocomplete"))
        .and(body_json(json!({ "prefix": "te" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["team inbox", "test"])))
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let names = client.list_mailbox_names(Some("te")).await.unwrap();
    assert_eq!(names, ["team inbox", "test"]);
}

#[tokio::test]
async fn test_attachment_bytes() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/mailbox/inbox/email/e1/attachments/report%20v1.pdf"))
        .and(header("Authorization", BEARER))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let bytes = client
        .get_attachment_bytes("inbox", "e1", "report v1.pdf")
        .await
        .unwrap();
    assert_eq!(bytes, b"%PDF-1.7");
}

#[tokio::test]
async fn test_set_read_state_sends_flag() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/api/mailbox/inbox/email/e1"))
        .and(body_json(json!({ "isRead": false })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    client.set_read_state("inbox", "e1", false).await.unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Poll-Until-Match Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_inbox_times_out() {
    let (server, _store) = fake_server().await;
    let client = AhemClient::new(server.uri()).unwrap();
    let criteria = MatchCriteria::new().subject_contains("verify");

    let started = Instant::now();
    let err = poll_until_match(&client, &criteria, &options(500, 100))
        .await
        .unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(500));
    match err {
        Error::WaitTimeout {
            mailbox,
            criteria,
            timeout,
        } => {
            assert_eq!(mailbox, "inbox");
            assert_eq!(criteria, "subject contains \"verify\"");
            assert_eq!(timeout, Duration::from_millis(500));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_bounds_fetch_attempts() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "Welcome", "Hello"));

    let client = AhemClient::new(server.uri()).unwrap();
    let criteria = MatchCriteria::new().subject_contains("never");

    let err = poll_until_match(&client, &criteria, &options(250, 100))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WaitTimeout { .. }));

    let fetches = count_requests(&server, "GET", "/api/mailbox/inbox/email").await;
    assert!((2..=4).contains(&fetches), "made {fetches} fetches");
}

#[tokio::test]
async fn test_email_arriving_later_is_found() {
    let (server, store) = fake_server().await;
    let client = AhemClient::new(server.uri()).unwrap();

    let late = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        late.push(Stored::new(
            "e1",
            "Please verify your account",
            "Your code is 483920",
        ));
    });

    let criteria = MatchCriteria::new().subject_contains("verify");
    let email = poll_until_match(&client, &criteria, &options(1000, 50))
        .await
        .unwrap();

    assert_eq!(email.subject(), "Please verify your account");
    assert_eq!(email.extract_verification_code().unwrap(), "483920");

    // Marked read on the server; the snapshot was taken before that
    assert!(store.is_read("e1"));
    assert_eq!(email.record().is_read, Some(false));
}

#[tokio::test]
async fn test_first_match_in_server_order_wins() {
    let (server, store) = fake_server().await;
    let mut newer = Stored::new("newer", "verify A", "1111");
    newer.timestamp += 60_000;
    store.push(Stored::new("unrelated", "Welcome", ""));
    store.push(Stored::new("older", "verify B", "2222"));
    store.push(newer);

    let client = AhemClient::new(server.uri()).unwrap();
    let criteria = MatchCriteria::new().subject_contains("verify");
    let email = poll_until_match(&client, &criteria, &options(1000, 50))
        .await
        .unwrap();

    assert_eq!(email.id(), "older");
}

#[tokio::test]
async fn test_mark_as_read_can_be_disabled() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "verify", ""));

    let client = AhemClient::new(server.uri()).unwrap();
    poll_until_match(&client, &MatchCriteria::new(), &options(1000, 50).mark_as_read(false))
        .await
        .unwrap();

    assert!(!store.is_read("e1"));
    assert_eq!(count_requests(&server, "PATCH", "/api/mailbox").await, 0);
}

#[tokio::test]
async fn test_custom_predicate_overrides_criteria() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "verify", ""));
    store.push(Stored::new("e2", "something else", ""));

    let client = AhemClient::new(server.uri()).unwrap();
    let criteria = MatchCriteria::new()
        .subject_contains("verify")
        .custom(|s| s.email_id == "e2");

    let email = poll_until_match(&client, &criteria, &options(1000, 50))
        .await
        .unwrap();
    assert_eq!(email.id(), "e2");
}

#[tokio::test]
async fn test_recipient_criteria_check_full_records() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "Welcome", "").to("alice@inbox.local"));
    store.push(Stored::new("e2", "Welcome", "").to("bob@inbox.local"));

    let client = AhemClient::new(server.uri()).unwrap();
    let criteria = MatchCriteria::new()
        .subject_contains("Welcome")
        .to_contains("bob@");

    let email = poll_until_match(&client, &criteria, &options(1000, 50).mark_as_read(false))
        .await
        .unwrap();

    assert_eq!(email.id(), "e2");
    // Both candidates were fetched in full, the match was not fetched twice
    assert_eq!(count_requests(&server, "GET", "/api/mailbox/inbox/email/").await, 2);
}

#[tokio::test]
async fn test_summary_criteria_fetch_only_the_match() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "verify A", ""));
    store.push(Stored::new("e2", "verify B", ""));

    let client = AhemClient::new(server.uri()).unwrap();
    let criteria = MatchCriteria::new().subject_contains("verify");
    let email = poll_until_match(&client, &criteria, &options(1000, 50).mark_as_read(false))
        .await
        .unwrap();

    assert_eq!(email.id(), "e1");
    assert_eq!(count_requests(&server, "GET", "/api/mailbox/inbox/email/").await, 1);
}

#[tokio::test]
async fn test_zero_poll_interval_makes_no_requests() {
    let (server, _store) = fake_server().await;
    let client = AhemClient::new(server.uri()).unwrap();

    let err = poll_until_match(&client, &MatchCriteria::new(), &options(300, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert_eq!(count_requests(&server, "GET", "/api/mailbox").await, 0);
}

#[tokio::test]
async fn test_match_on_fetch_started_before_deadline_is_honoured() {
    let (server, store) = fake_server_with_delay(Duration::from_millis(300)).await;
    store.push(Stored::new("e1", "verify", ""));

    let client = AhemClient::new(server.uri()).unwrap();
    client.authenticate().await.unwrap();

    let started = Instant::now();
    let email = poll_until_match(&client, &MatchCriteria::new(), &options(100, 50))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(email.id(), "e1");
}

#[tokio::test]
async fn test_listing_error_aborts_wait() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/mailbox/inbox/email"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let started = Instant::now();
    let err = poll_until_match(&client, &MatchCriteria::new(), &options(5_000, 50))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.status(), Some(503));
    assert!(!matches!(err, Error::WaitTimeout { .. }));
}

#[tokio::test]
async fn test_mark_as_read_failure_is_not_a_timeout() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "verify", ""));

    Mock::given(method("PATCH"))
        .and(path("/api/mailbox/inbox/email/e1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .with_priority(1)
        .mount(&server)
        .await;

    let client = AhemClient::new(server.uri()).unwrap();
    let err = poll_until_match(&client, &MatchCriteria::new(), &options(1000, 50))
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_find_first_does_not_wait() {
    let (server, store) = fake_server().await;
    let client = AhemClient::new(server.uri()).unwrap();

    let none = find_first(&client, &MatchCriteria::new(), "inbox").await.unwrap();
    assert!(none.is_none());

    store.push(Stored::new("e1", "verify", ""));
    let found = find_first(&client, &MatchCriteria::new(), "inbox")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), "e1");
    assert!(!store.is_read("e1"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Email Value Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mark_as_read_is_idempotent_and_only_changes_read_state() {
    let (server, store) = fake_server().await;
    store.push(Stored::new(
        "e1",
        "Confirm",
        "Click http://example.com/confirm?x=1 to continue",
    ));

    let helper = MailHelper::setup(config_for(&server)).await.unwrap();
    let email = helper.get_email("e1").await.unwrap();
    assert_eq!(
        email.extract_link("confirm").unwrap(),
        "http://example.com/confirm?x=1"
    );

    email.mark_as_read().await.unwrap();
    let once = email.refresh().await.unwrap();
    email.mark_as_read().await.unwrap();
    let twice = email.refresh().await.unwrap();

    assert_eq!(once.record(), twice.record());

    let mut expected = email.record().clone();
    expected.is_read = Some(true);
    assert_eq!(once.record(), &expected);
}

#[tokio::test]
async fn test_delete_then_refresh_is_not_found() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "Bye", ""));

    let helper = MailHelper::setup(config_for(&server)).await.unwrap();
    let email = helper.get_email("e1").await.unwrap();
    email.delete().await.unwrap();

    assert_eq!(store.len(), 0);
    assert_eq!(email.refresh().await.unwrap_err().status(), Some(404));
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_helper_wait_uses_config() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "Please verify", "Your code is 483920"));

    let helper = MailHelper::setup(config_for(&server)).await.unwrap();
    let email = helper
        .wait_for_email(&MatchCriteria::new().subject_contains("verify"))
        .await
        .unwrap();

    assert_eq!(email.mailbox(), "inbox");
    assert_eq!(email.extract_verification_code().unwrap(), "483920");
}

#[tokio::test]
async fn test_cleanup_deletes_every_email() {
    let (server, store) = fake_server().await;
    for id in ["e1", "e2", "e3"] {
        store.push(Stored::new(id, "x", ""));
    }

    let helper = MailHelper::setup(config_for(&server)).await.unwrap();
    let report = helper.teardown().await.unwrap();

    assert_eq!(report.deleted, 3);
    assert!(report.is_clean());
    assert_eq!(count_requests(&server, "DELETE", "/api/mailbox/inbox/email/").await, 3);

    let client = AhemClient::new(server.uri()).unwrap();
    assert!(client.list_summaries("inbox").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cleanup_failure_is_downgraded() {
    let (server, store) = fake_server().await;
    for id in ["e1", "e2", "e3"] {
        store.push(Stored::new(id, "x", ""));
    }

    Mock::given(method("DELETE"))
        .and(path("/api/mailbox/inbox/email/e2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("locked"))
        .with_priority(1)
        .mount(&server)
        .await;

    let helper = MailHelper::setup(config_for(&server)).await.unwrap();
    let report = helper.cleanup().await;

    assert_eq!(report.deleted, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.is_clean());
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_guard_cleans_up_while_runtime_lives() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "x", ""));
    store.push(Stored::new("e2", "x", ""));

    let guard = MailHelper::setup(config_for(&server))
        .await
        .unwrap()
        .into_guard();
    drop(guard);

    // The runtime outlives the drop here, so the scheduled cleanup completes
    let deadline = Instant::now() + Duration::from_secs(2);
    while store.len() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn test_dropped_guard_without_cleanup_leaves_mailbox() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "x", ""));

    let config = HelperConfig::from_layers_with_env(
        &[ahem_helper::ConfigLayer::new()
            .base_url(server.uri())
            .cleanup_after_run(false)],
        None,
    )
    .unwrap();
    drop(MailHelper::setup(config).await.unwrap().into_guard());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.len(), 1);
    assert_eq!(count_requests(&server, "DELETE", "/api/mailbox").await, 0);
}

#[tokio::test]
async fn test_guard_finish_runs_cleanup() {
    let (server, store) = fake_server().await;
    store.push(Stored::new("e1", "x", ""));

    let guard = MailHelper::setup(config_for(&server))
        .await
        .unwrap()
        .into_guard();
    assert_eq!(guard.list_emails(None).await.unwrap().len(), 1);

    let report = guard.finish().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(store.len(), 0);
}
