use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;

use crate::{AppState, jobs::run_data_refresh, monzo::MonzoError, store::StoreError};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigurationParams {
    pub account: Option<String>,
    pub refresh_interval: Option<String>,
}

#[derive(Debug)]
pub enum AppError {
    Monzo(MonzoError),
    Store(StoreError),
    BadRequest(String),
    /// Reported as `{"statusCode": 400, "body": ...}` by the save step.
    Configuration(String),
}

impl From<MonzoError> for AppError {
    fn from(err: MonzoError) -> Self {
        AppError::Monzo(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Monzo(err) => {
                let message = match &err {
                    MonzoError::Status { status, .. } => {
                        format!("Monzo request failed with status_code={}", status)
                    }
                    _ => "Monzo request failed".to_string(),
                };
                (StatusCode::BAD_GATEWAY, message)
            }
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Store error".to_string()),
            AppError::BadRequest(msg) => {
                tracing::info!("Bad request: {}", &msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Configuration(msg) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "statusCode": 400, "body": msg })),
                )
                    .into_response();
            }
        };

        (
            status,
            Json(serde_json::json!({ "message": error_message })),
        )
            .into_response()
    }
}

/// 302 Found, as browsers following the setup flow expect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

// Step 1: authorise with Monzo.
pub async fn ui(State(state): State<Arc<AppState>>) -> Html<String> {
    let settings = state.settings.get_settings().await;

    Html(format!(
        r#"
        <h1>Monzo Driver Authentication</h1>
        <form action="{}">
            <input type="hidden" name="client_id" value="{}" />
            <input type="hidden" name="redirect_uri" value="{}" />
            <input type="hidden" name="response_type" value="code" />
            <button>Authorise</button>
        </form>
        "#,
        escape_html(&state.auth_url),
        escape_html(&settings.client_id),
        escape_html(&settings.redirect_uri),
    ))
}

// Step 2: exchange the authorisation code for tokens.
#[axum::debug_handler]
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let code = params.code.ok_or(AppError::BadRequest(String::from(
        "No authorisation code received",
    )))?;

    if code.is_empty() {
        return Err(AppError::BadRequest(String::from(
            "Empty authorisation code received",
        )));
    }

    tracing::info!("Received authorisation code");

    let settings = state.settings.get_settings().await;
    let token_response = state
        .monzo
        .exchange_code(
            &settings.client_id,
            &settings.client_secret,
            &settings.redirect_uri,
            &code,
        )
        .await?;

    state
        .settings
        .update(|settings| settings.auth_details = Some(token_response))
        .await?;

    tracing::info!("Stored auth details, redirecting to /configure");

    Ok(found("/configure"))
}

// Step 3: choose the account to monitor.
pub async fn configure(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let settings = state.settings.get_settings().await;

    let Some(auth_details) = settings.auth_details else {
        tracing::info!("No auth details stored, redirecting to /ui");
        return Ok(found("/ui"));
    };

    let accounts = state.monzo.list_accounts(&auth_details).await?;

    let mut page = String::from(
        "<h1>Monzo Driver Configuration</h1>\
         <p>Please choose the account you want to monitor and its refresh interval:</p>\
         <form action=\"/saveConfiguration\">\
         Accounts:<br>",
    );

    for account in accounts.iter() {
        let checked = if settings.account_id.as_deref() == Some(account.id.as_str()) {
            " checked"
        } else {
            ""
        };
        page.push_str(&format!(
            r#"<input type="radio" name="account" value="{}"{}> {} (<i>{}</i>)<br><br>"#,
            escape_html(&account.id),
            checked,
            escape_html(&account.description),
            escape_html(account.account_type.as_deref().unwrap_or("unknown")),
        ));
    }

    let refresh_interval = settings.refresh_interval.as_deref().unwrap_or("30");
    page.push_str(&format!(
        r#"Refresh Interval (minutes): <input type="text" name="refresh_interval" value="{}"><br><br>"#,
        escape_html(refresh_interval)
    ));
    page.push_str("<button>Save Configuration</button></form>");

    Ok(Html(page).into_response())
}

// Step 4: save the configuration and start monitoring.
#[axum::debug_handler]
pub async fn save_configuration(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConfigurationParams>,
) -> Result<Response, AppError> {
    let account = params.account.filter(|value| !value.is_empty());
    let refresh_interval = params.refresh_interval.filter(|value| !value.is_empty());

    let (Some(account), Some(refresh_interval)) = (account, refresh_interval) else {
        return Err(AppError::Configuration(String::from(
            "account and refresh_interval are required.",
        )));
    };

    tracing::info!(
        "Saving configuration account_id={} refresh_interval={}",
        &account,
        &refresh_interval
    );

    state
        .settings
        .update(|settings| {
            settings.account_id = Some(account);
            settings.refresh_interval = Some(refresh_interval);
        })
        .await
        .map_err(|err| {
            tracing::error!("Error saving configuration: {}", err);
            AppError::Configuration(String::from("error saving configuration settings."))
        })?;

    run_data_refresh(&state, Utc::now()).await;

    Ok(found("/status"))
}

pub async fn status() -> &'static str {
    "active"
}
