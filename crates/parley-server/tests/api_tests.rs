use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use parley_server::api::{build_router, AppState};
use parley_server::auth::IdentityVerifier;
use parley_server::blob_store::BlobStore;
use parley_server::config::ServerConfig;
use parley_shared::identity_token::create_identity_token;
use parley_store::Database;

struct TestApp {
    router: Router,
    issuer: SigningKey,
    _blobs: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let issuer = SigningKey::generate(&mut OsRng);
        let blobs = TempDir::new().unwrap();

        let config = ServerConfig {
            blob_storage_path: blobs.path().to_path_buf(),
            public_base_url: "http://chat.test".into(),
            identity_issuer_pubkey: issuer.verifying_key().to_bytes(),
            ..ServerConfig::default()
        };
        let blob_store = BlobStore::new(
            config.blob_storage_path.clone(),
            config.max_blob_size,
            config.public_base_url.clone(),
            config.upload_ticket_ttl,
        )
        .await
        .unwrap();
        let verifier = IdentityVerifier::new(config.identity_issuer_pubkey);
        let db = Database::open_in_memory()
            .unwrap()
            .with_presence_stale_after(config.presence_stale_after);

        Self {
            router: build_router(AppState::new(db, blob_store, verifier, config)),
            issuer,
            _blobs: blobs,
        }
    }

    fn token(&self, subject: &str) -> String {
        create_identity_token(subject, Utc::now() + Duration::hours(1), &self.issuer).encode()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        subject: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(subject) = subject {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(subject)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Sync a profile and return its user id.
    async fn sync(&self, subject: &str, name: &str, email: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/users/sync",
                Some(subject),
                Some(json!({ "subject": subject, "name": name, "email": email })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["userId"].as_str().unwrap().to_string()
    }

    async fn direct(&self, subject: &str, other: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/conversations/direct",
                Some(subject),
                Some(json!({ "otherUserId": other })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["conversationId"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_needs_no_auth() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn auth_state_reflects_token_and_profile() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/auth/state", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isAuthenticated": false, "hasProfile": false }));

    let (_, body) = app.call(Method::GET, "/auth/state", Some("sub_a"), None).await;
    assert_eq!(body, json!({ "isAuthenticated": true, "hasProfile": false }));

    app.sync("sub_a", "Alice", "alice@example.com").await;
    let (_, body) = app.call(Method::GET, "/auth/state", Some("sub_a"), None).await;
    assert_eq!(body, json!({ "isAuthenticated": true, "hasProfile": true }));
}

#[tokio::test]
async fn missing_identity_and_missing_profile() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/conversations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, body) = app.call(Method::GET, "/conversations", Some("sub_new"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "profile_not_synced");
}

#[tokio::test]
async fn forged_token_is_unauthenticated() {
    let app = TestApp::new().await;
    app.sync("sub_a", "Alice", "alice@example.com").await;

    let impostor = SigningKey::generate(&mut OsRng);
    let forged = create_identity_token("sub_a", Utc::now() + Duration::hours(1), &impostor);
    let request = Request::builder()
        .uri("/users/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", forged.encode()))
        .body(Body::empty())
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sync_rejects_foreign_subject() {
    let app = TestApp::new().await;
    let (status, _) = app
        .call(
            Method::POST,
            "/users/sync",
            Some("sub_a"),
            Some(json!({ "subject": "sub_b", "name": "Mallory", "email": "m@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn direct_chat_flow() {
    let app = TestApp::new().await;
    let _alice = app.sync("sub_a", "Alice", "alice@example.com").await;
    let bob = app.sync("sub_b", "Bob", "bob@example.com").await;

    let first = app.direct("sub_a", &bob).await;
    assert_eq!(app.direct("sub_a", &bob).await, first);

    let uri = format!("/conversations/{first}/messages");
    let (status, _) = app
        .call(Method::POST, &uri, Some("sub_a"), Some(json!({ "body": "hi Bob" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = app.call(Method::GET, "/conversations", Some("sub_b"), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["unreadCount"], 1);
    assert_eq!(list[0]["lastMessage"]["body"], "hi Bob");
    assert_eq!(list[0]["otherMember"]["name"], "Alice");

    let (status, _) = app
        .call(Method::POST, &format!("/conversations/{first}/read"), Some("sub_b"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, list) = app.call(Method::GET, "/conversations", Some("sub_b"), None).await;
    assert_eq!(list[0]["unreadCount"], 0);

    let (_, messages) = app.call(Method::GET, &uri, Some("sub_b"), None).await;
    assert_eq!(messages[0]["body"], "hi Bob");
    assert_eq!(messages[0]["sender"]["name"], "Alice");
}

#[tokio::test]
async fn outsiders_get_not_found_or_empty() {
    let app = TestApp::new().await;
    app.sync("sub_a", "Alice", "alice@example.com").await;
    let bob = app.sync("sub_b", "Bob", "bob@example.com").await;
    app.sync("sub_c", "Carol", "carol@example.com").await;
    let id = app.direct("sub_a", &bob).await;

    let (status, _) = app
        .call(Method::GET, &format!("/conversations/{id}"), Some("sub_c"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(Method::GET, &format!("/conversations/{id}/messages"), Some("sub_c"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/conversations/{id}/messages"),
            Some("sub_c"),
            Some(json!({ "body": "let me in" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Conversation not found.");
}

#[tokio::test]
async fn group_validation_messages() {
    let app = TestApp::new().await;
    app.sync("sub_a", "Alice", "alice@example.com").await;
    let bob = app.sync("sub_b", "Bob", "bob@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/conversations/group",
            Some("sub_a"),
            Some(json!({ "title": "Duo", "memberIds": [bob] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");
    assert_eq!(
        body["error"],
        "Please add at least 2 teammates to create a group."
    );

    let (status, body) = app
        .call(
            Method::POST,
            "/conversations/group",
            Some("sub_a"),
            Some(json!({ "title": "   ", "memberIds": [bob] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Group name is required.");
}

#[tokio::test]
async fn delete_and_react() {
    let app = TestApp::new().await;
    app.sync("sub_a", "Alice", "alice@example.com").await;
    let bob = app.sync("sub_b", "Bob", "bob@example.com").await;
    let id = app.direct("sub_a", &bob).await;

    let (_, sent) = app
        .call(
            Method::POST,
            &format!("/conversations/{id}/messages"),
            Some("sub_a"),
            Some(json!({ "body": "secret" })),
        )
        .await;
    let message = sent["messageId"].as_str().unwrap().to_string();

    let reactions = format!("/messages/{message}/reactions");
    let (_, body) = app
        .call(Method::POST, &reactions, Some("sub_b"), Some(json!({ "emoji": "❤️" })))
        .await;
    assert_eq!(body, json!({ "reacted": true }));
    let (_, body) = app
        .call(Method::POST, &reactions, Some("sub_b"), Some(json!({ "emoji": "❤️" })))
        .await;
    assert_eq!(body, json!({ "reacted": false }));

    let (status, body) = app
        .call(Method::DELETE, &format!("/messages/{message}"), Some("sub_b"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "not_owner");

    let (status, _) = app
        .call(Method::DELETE, &format!("/messages/{message}"), Some("sub_a"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, messages) = app
        .call(Method::GET, &format!("/conversations/{id}/messages"), Some("sub_b"), None)
        .await;
    assert_eq!(messages[0]["deleted"], true);
    assert_eq!(messages[0]["body"], "");
}

#[tokio::test]
async fn typing_round_trip() {
    let app = TestApp::new().await;
    app.sync("sub_a", "Alice", "alice@example.com").await;
    let bob = app.sync("sub_b", "Bob", "bob@example.com").await;
    let id = app.direct("sub_a", &bob).await;
    let uri = format!("/conversations/{id}/typing");

    let (status, _) = app
        .call(Method::POST, &uri, Some("sub_a"), Some(json!({ "isTyping": true })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, names) = app.call(Method::GET, &uri, Some("sub_b"), None).await;
    assert_eq!(names, json!(["Alice"]));
    let (_, names) = app.call(Method::GET, &uri, Some("sub_a"), None).await;
    assert_eq!(names, json!([]));
}

#[tokio::test]
async fn search_excludes_caller() {
    let app = TestApp::new().await;
    app.sync("sub_me", "Joanna Me", "me@example.com").await;
    app.sync("sub_1", "John Doe", "jd@example.com").await;
    app.sync("sub_2", "Jordan", "jordan@example.com").await;
    app.sync("sub_3", "Smith", "smith@example.com").await;

    let (status, body) = app
        .call(Method::GET, "/users/search?q=jo", Some("sub_me"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["John Doe", "Jordan"]);
}

#[tokio::test]
async fn file_message_flow() {
    let app = TestApp::new().await;
    app.sync("sub_a", "Alice", "alice@example.com").await;
    let bob = app.sync("sub_b", "Bob", "bob@example.com").await;
    let id = app.direct("sub_a", &bob).await;

    let (status, ticket) = app
        .call(Method::POST, "/files/upload-url", Some("sub_a"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let storage_ref = ticket["storageRef"].as_str().unwrap().to_string();
    assert_eq!(
        ticket["uploadUrl"],
        format!("http://chat.test/blob/upload/{storage_ref}")
    );

    let file = json!({
        "storageRef": storage_ref,
        "fileName": "beach.png",
        "fileType": "image/png",
        "fileSize": 5,
    });

    // Not uploaded yet.
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/conversations/{id}/files"),
            Some("sub_a"),
            Some(file.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let upload = Request::builder()
        .method(Method::POST)
        .uri(format!("/blob/upload/{storage_ref}"))
        .body(Body::from("bytes"))
        .unwrap();
    let (status, _) = app.send(upload).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/conversations/{id}/files"),
            Some("sub_a"),
            Some(file),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, messages) = app
        .call(Method::GET, &format!("/conversations/{id}/messages"), Some("sub_b"), None)
        .await;
    let attachment = &messages[0]["attachment"];
    assert_eq!(attachment["kind"], "image");
    assert_eq!(
        attachment["url"],
        format!("http://chat.test/blob/{storage_ref}")
    );

    let download = Request::builder()
        .uri(format!("/blob/{storage_ref}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(download).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"bytes");
}

#[tokio::test]
async fn malformed_ids_are_empty_or_not_found() {
    let app = TestApp::new().await;
    app.sync("sub_a", "Alice", "alice@example.com").await;

    for uri in ["/conversations/not-a-uuid/messages", "/conversations/not-a-uuid/typing"] {
        let (status, body) = app.call(Method::GET, uri, Some("sub_a"), None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, json!([]), "{uri}");
    }

    let (status, body) = app
        .call(Method::GET, "/conversations/not-a-uuid", Some("sub_a"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, body) = app
        .call(Method::DELETE, "/messages/not-a-uuid", Some("sub_a"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    // Identity is still checked first.
    let (status, body) = app
        .call(Method::GET, "/conversations/not-a-uuid/messages", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn malformed_bodies_get_error_json() {
    let app = TestApp::new().await;
    app.sync("sub_a", "Alice", "alice@example.com").await;
    let bob = app.sync("sub_b", "Bob", "bob@example.com").await;
    let id = app.direct("sub_a", &bob).await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/conversations/{id}/messages"),
            Some("sub_a"),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert!(body["error"].is_string());

    let (status, body) = app
        .call(Method::POST, "/presence", Some("sub_a"), Some(json!({ "isOnline": "yes" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn identity_is_checked_before_the_body() {
    let app = TestApp::new().await;

    for uri in ["/conversations/direct", "/conversations/group", "/users/sync", "/presence"] {
        let (status, body) = app.call(Method::POST, uri, None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["code"], "unauthenticated", "{uri}");
    }

    // Verified but unsynced callers hear about the profile, not the body.
    let (status, body) = app
        .call(Method::POST, "/conversations/direct", Some("sub_new"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "profile_not_synced");
}

#[tokio::test]
async fn presence_and_current_user() {
    let app = TestApp::new().await;
    let alice = app.sync("sub_a", "Alice", "alice@example.com").await;
    let bob = app.sync("sub_b", "Bob", "bob@example.com").await;
    let id = app.direct("sub_a", &bob).await;

    let (status, me) = app.call(Method::GET, "/users/me", Some("sub_a"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], alice);
    assert_eq!(me["name"], "Alice");
    assert_eq!(me["isOnline"], true);

    let (status, _) = app
        .call(Method::POST, "/presence", Some("sub_a"), Some(json!({ "isOnline": false })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, me) = app.call(Method::GET, "/users/me", Some("sub_a"), None).await;
    assert_eq!(me["isOnline"], false);
    let (_, view) = app
        .call(Method::GET, &format!("/conversations/{id}"), Some("sub_b"), None)
        .await;
    assert_eq!(view["otherMember"]["id"], alice);
    assert_eq!(view["otherMember"]["isOnline"], false);

    // Signing in again brings the user back online for everyone.
    app.sync("sub_a", "Alice", "alice@example.com").await;
    let (_, me) = app.call(Method::GET, "/users/me", Some("sub_a"), None).await;
    assert_eq!(me["isOnline"], true);
    let (_, view) = app
        .call(Method::GET, &format!("/conversations/{id}"), Some("sub_b"), None)
        .await;
    assert_eq!(view["otherMember"]["isOnline"], true);
}
