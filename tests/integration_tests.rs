use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use expense_access::http::{AuthedClient, FetchError};
use expense_access::models::{ExpenseUpdate, NewExpense};
use expense_access::providers::{DocumentStore, MemoryDocumentStore, MemoryIdentityProvider};
use expense_access::services::{ExpenseError, ExpenseService, Session};

/// Test fixture wiring the memory backends into the access layer
struct TestContext {
    session: Session,
    service: ExpenseService,
    store: Arc<MemoryDocumentStore>,
}

impl TestContext {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let provider = Arc::new(MemoryIdentityProvider::new());
        let store = Arc::new(MemoryDocumentStore::new());
        let session = Session::new(provider);
        let service = ExpenseService::new(session.clone(), store.clone());

        Self {
            session,
            service,
            store,
        }
    }

    async fn sign_up(&self, email: &str) -> String {
        self.session
            .sign_up(email, "password123")
            .await
            .expect("sign up failed")
            .uid
    }
}

fn new_expense(description: &str, date: &str, cost: f64) -> NewExpense {
    NewExpense {
        description: description.to_string(),
        date: date.parse().expect("bad test date"),
        cost,
    }
}

/// Spawn an axum server on an ephemeral port for authed-fetch tests
async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });
    addr
}

/// Echoes the Authorization header, 401 when it is missing
async fn echo_authorization(headers: HeaderMap) -> Result<String, StatusCode> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)
}

#[tokio::test]
async fn test_expense_lifecycle() {
    let ctx = TestContext::new();
    let uid = ctx.sign_up("lifecycle@example.com").await;

    // Example from the product brief: a 4.50 coffee
    let id = ctx
        .service
        .add_expense(new_expense("Coffee", "2024-01-01", 4.5))
        .await
        .unwrap();

    let expenses = ctx.service.fetch_expenses().await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].id, id);
    assert_eq!(expenses[0].cost, 4.5);
    assert!(!expenses[0].deleted);

    ctx.service
        .update_expense(
            &id,
            ExpenseUpdate {
                cost: Some(5.0),
                ..ExpenseUpdate::default()
            },
        )
        .await
        .unwrap();

    let expenses = ctx.service.fetch_expenses().await.unwrap();
    assert_eq!(expenses[0].cost, 5.0);
    assert_eq!(expenses[0].description, "Coffee");

    ctx.service.delete_expense(&id).await.unwrap();
    assert!(ctx.service.fetch_expenses().await.unwrap().is_empty());

    // Soft delete: the record is still in storage, flag flipped
    let document = ctx
        .store
        .get(&format!("users/{uid}/expenses"), &id)
        .await
        .unwrap()
        .expect("record was removed from storage");
    assert_eq!(
        document.fields.get("deleted"),
        Some(&serde_json::json!(true))
    );
}

#[tokio::test]
async fn test_fetch_ordering_across_many_records() {
    let ctx = TestContext::new();
    ctx.sign_up("ordering@example.com").await;

    for (description, date) in [
        ("Rent", "2024-01-01"),
        ("Groceries", "2024-01-15"),
        ("Cinema", "2024-01-08"),
        ("Lunch", "2024-02-02"),
    ] {
        ctx.service
            .add_expense(new_expense(description, date, 10.0))
            .await
            .unwrap();
    }

    let expenses = ctx.service.fetch_expenses().await.unwrap();
    let descriptions: Vec<&str> = expenses.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(descriptions, vec!["Lunch", "Groceries", "Cinema", "Rent"]);
}

#[tokio::test]
async fn test_crud_rejected_after_sign_out() {
    let ctx = TestContext::new();
    ctx.sign_up("signout@example.com").await;

    ctx.service
        .add_expense(new_expense("Coffee", "2024-01-01", 4.5))
        .await
        .unwrap();
    ctx.session.sign_out().await.unwrap();

    assert!(matches!(
        ctx.service.fetch_expenses().await,
        Err(ExpenseError::NotSignedIn)
    ));

    // Records are still there once the user signs back in
    ctx.session
        .sign_in("signout@example.com", "password123")
        .await
        .unwrap();
    assert_eq!(ctx.service.fetch_expenses().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_auth_state_listener_over_session_lifecycle() {
    let ctx = TestContext::new();
    let events = Arc::new(Mutex::new(Vec::new()));

    let events_clone = Arc::clone(&events);
    let subscription = ctx.session.on_auth_changed(move |user| {
        events_clone
            .lock()
            .unwrap()
            .push(user.map(|u| u.email));
    });

    ctx.sign_up("observer@example.com").await;
    ctx.session.sign_out().await.unwrap();
    ctx.session
        .sign_in("observer@example.com", "password123")
        .await
        .unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            Some("observer@example.com".to_string()),
            None,
            Some("observer@example.com".to_string()),
        ]
    );

    subscription.unsubscribe();
    ctx.session.sign_out().await.unwrap();
    assert_eq!(events.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_authed_fetch_attaches_bearer_token() {
    let ctx = TestContext::new();
    ctx.sign_up("fetcher@example.com").await;

    let addr = spawn_server(Router::new().route("/whoami", get(echo_authorization))).await;

    let client = AuthedClient::new(ctx.session.clone());
    let response = client
        .fetch(reqwest::Client::new().get(format!("http://{addr}/whoami")))
        .await
        .unwrap();

    let header = response.text().await.unwrap();
    assert!(header.starts_with("Bearer "));

    let expected = ctx.session.id_token(false).await.unwrap().unwrap();
    assert_eq!(header, format!("Bearer {expected}"));
}

#[tokio::test]
async fn test_authed_fetch_omits_header_when_unauthenticated() {
    let ctx = TestContext::new();

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = Arc::clone(&counter);

    let addr = spawn_server(Router::new().route("/whoami", get(echo_authorization))).await;

    let client = AuthedClient::new(ctx.session.clone()).with_unauthorized_handler(move || {
        counter_clone.fetch_add(1, Ordering::SeqCst);
    });

    // No identity resolved, so no header is sent and the endpoint 401s
    let result = client
        .fetch(reqwest::Client::new().get(format!("http://{addr}/whoami")))
        .await;

    assert!(matches!(result, Err(FetchError::Unauthorized)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authed_fetch_401_invokes_handler_exactly_once() {
    let ctx = TestContext::new();
    ctx.sign_up("rejected@example.com").await;

    let addr = spawn_server(Router::new().route(
        "/reject",
        get(|| async { StatusCode::UNAUTHORIZED }),
    ))
    .await;

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = Arc::clone(&counter);
    let client = AuthedClient::new(ctx.session.clone()).with_unauthorized_handler(move || {
        counter_clone.fetch_add(1, Ordering::SeqCst);
    });

    let result = client
        .fetch(reqwest::Client::new().get(format!("http://{addr}/reject")))
        .await;

    assert!(matches!(result, Err(FetchError::Unauthorized)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authed_fetch_passes_through_non_401_statuses() {
    let ctx = TestContext::new();
    ctx.sign_up("errors@example.com").await;

    let addr = spawn_server(Router::new().route(
        "/broken",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await;

    let client = AuthedClient::new(ctx.session.clone());
    let response = client
        .fetch(reqwest::Client::new().get(format!("http://{addr}/broken")))
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_duplicate_sign_up_is_rejected_with_code() {
    let ctx = TestContext::new();
    ctx.sign_up("dup@example.com").await;
    ctx.session.sign_out().await.unwrap();

    let err = ctx
        .session
        .sign_up("dup@example.com", "password123")
        .await
        .unwrap_err();
    assert_eq!(err.code, "auth/email-already-in-use");
}

#[tokio::test]
async fn test_two_identities_do_not_share_expenses() {
    let ctx = TestContext::new();

    ctx.sign_up("alpha@example.com").await;
    ctx.service
        .add_expense(new_expense("Alpha lunch", "2024-01-01", 12.0))
        .await
        .unwrap();
    ctx.session.sign_out().await.unwrap();

    ctx.sign_up("beta@example.com").await;
    ctx.service
        .add_expense(new_expense("Beta dinner", "2024-01-02", 30.0))
        .await
        .unwrap();

    let expenses = ctx.service.fetch_expenses().await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].description, "Beta dinner");
}

#[tokio::test]
async fn test_forced_token_refresh_changes_bearer_token() {
    let ctx = TestContext::new();
    ctx.sign_up("refresh@example.com").await;

    let cached = ctx.session.id_token(false).await.unwrap().unwrap();
    let refreshed = ctx.session.id_token(true).await.unwrap().unwrap();
    assert_ne!(cached, refreshed);

    // The refreshed token becomes the cached one
    let again = ctx.session.id_token(false).await.unwrap().unwrap();
    assert_eq!(refreshed, again);
}
