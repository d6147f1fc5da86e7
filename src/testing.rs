//! Test doubles shared by the handler, scheduler and client tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::TimeDelta;
use serde_json::{Value, json};

use crate::AppState;
use crate::args::SettingsAccess;
use crate::jobs::Schedule;
use crate::monzo::MonzoClient;
use crate::publisher::Publisher;
use crate::settings::tests::{auth_details, default_settings};
use crate::settings::{AuthDetails, Settings, SettingsStore};
use crate::store::memory::MemoryStore;

#[derive(Default)]
struct Recorded {
    requests: Vec<String>,
    token_forms: Vec<HashMap<String, String>>,
    authorizations: Vec<String>,
    reject_with: Option<u16>,
    garbage: bool,
}

type Shared = Arc<Mutex<Recorded>>;

/// A local stand-in for the Monzo API that records what it was asked.
pub(crate) struct FakeMonzo {
    addr: SocketAddr,
    recorded: Shared,
}

impl FakeMonzo {
    pub(crate) async fn start() -> Self {
        let recorded = Shared::default();

        let app = Router::new()
            .route("/oauth2/token", post(token))
            .route("/accounts", get(accounts))
            .route("/balance", get(balance))
            .route("/transactions", get(transactions))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, recorded }
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn client(&self) -> MonzoClient {
        MonzoClient::new(&self.url(), Duration::from_secs(5)).unwrap()
    }

    /// The token response handed out for a code or refresh token.
    pub(crate) fn token_for(grant: &str) -> AuthDetails {
        serde_json::from_value(token_json(grant)).unwrap()
    }

    pub(crate) fn reject_with(&self, status: u16) {
        self.recorded.lock().unwrap().reject_with = Some(status);
    }

    pub(crate) fn respond_with_garbage(&self) {
        self.recorded.lock().unwrap().garbage = true;
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.recorded.lock().unwrap().requests.clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.split('?').next() == Some(path))
            .count()
    }

    pub(crate) fn last_token_form(&self) -> HashMap<String, String> {
        self.recorded
            .lock()
            .unwrap()
            .token_forms
            .last()
            .cloned()
            .unwrap()
    }

    pub(crate) fn authorizations(&self) -> Vec<String> {
        self.recorded.lock().unwrap().authorizations.clone()
    }
}

fn token_json(grant: &str) -> Value {
    json!({
        "access_token": format!("access-from-{}", grant),
        "client_id": "oauth2client_test",
        "expires_in": 21600,
        "refresh_token": format!("refresh-from-{}", grant),
        "token_type": "Bearer",
        "user_id": "user_00001"
    })
}

fn reply(recorded: &Shared, body: Value) -> Response {
    let recorded = recorded.lock().unwrap();

    if let Some(status) = recorded.reject_with {
        let status = StatusCode::from_u16(status).unwrap();
        return (
            status,
            Json(json!({"code": "unauthorized", "message": "rejected by fake"})),
        )
            .into_response();
    }

    if recorded.garbage {
        return (StatusCode::OK, "not json").into_response();
    }

    Json(body).into_response()
}

fn record(recorded: &Shared, uri: &Uri, headers: &HeaderMap) {
    let mut recorded = recorded.lock().unwrap();
    recorded.requests.push(uri.to_string());
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        recorded
            .authorizations
            .push(value.to_str().unwrap().to_string());
    }
}

async fn token(
    State(recorded): State<Shared>,
    uri: Uri,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    record(&recorded, &uri, &headers);

    let grant = match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => form.get("code").cloned(),
        Some("refresh_token") => form.get("refresh_token").cloned(),
        _ => None,
    }
    .unwrap_or_default();
    recorded.lock().unwrap().token_forms.push(form);

    reply(&recorded, token_json(&grant))
}

async fn accounts(State(recorded): State<Shared>, uri: Uri, headers: HeaderMap) -> Response {
    record(&recorded, &uri, &headers);

    reply(
        &recorded,
        json!({
            "accounts": [
                {
                    "id": "acc_123",
                    "description": "Current account",
                    "type": "uk_retail",
                    "created": "2024-01-01T00:00:00.000Z",
                    "closed": false
                },
                {
                    "id": "acc_456",
                    "description": "Joint account",
                    "type": "uk_retail_joint",
                    "created": "2024-01-02T00:00:00.000Z",
                    "closed": false
                }
            ]
        }),
    )
}

async fn balance(State(recorded): State<Shared>, uri: Uri, headers: HeaderMap) -> Response {
    record(&recorded, &uri, &headers);

    reply(
        &recorded,
        json!({
            "balance": 5000,
            "total_balance": 6000,
            "currency": "GBP",
            "spend_today": -350
        }),
    )
}

async fn transactions(State(recorded): State<Shared>, uri: Uri, headers: HeaderMap) -> Response {
    record(&recorded, &uri, &headers);

    reply(
        &recorded,
        json!({
            "transactions": [
                {
                    "id": "tx_00001",
                    "amount": -350,
                    "currency": "GBP",
                    "created": "2024-03-01T08:30:00.000Z",
                    "description": "COFFEE SHOP",
                    "category": "eating_out",
                    "settled": "",
                    "notes": ""
                }
            ]
        }),
    )
}

/// Settings for a driver that has been authorised and pointed at `acc_123`.
pub(crate) fn configured_settings() -> Settings {
    Settings {
        auth_details: Some(auth_details()),
        account_id: Some("acc_123".to_string()),
        refresh_interval: Some("15".to_string()),
        ..default_settings()
    }
}

pub(crate) fn test_state(monzo: &FakeMonzo, store: Arc<MemoryStore>) -> Arc<AppState> {
    Arc::new(AppState {
        settings: SettingsStore::new(store.clone(), default_settings(), SettingsAccess::Serialized),
        monzo: monzo.client(),
        publisher: Publisher::new(store),
        schedule: tokio::sync::Mutex::new(Schedule::default()),
        auth_url: format!("{}/auth", monzo.url()),
        token_refresh_interval: TimeDelta::minutes(60),
    })
}
