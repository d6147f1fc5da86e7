mod args;
mod handlers;
mod jobs;
mod logging;
mod monzo;
mod publisher;
mod settings;
mod store;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use args::parse_args;
use axum::{Router, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use chrono::TimeDelta;
use handlers::{callback, configure, save_configuration, status, ui};
use jobs::{Schedule, refresh_task};
use logging::setup_logging;
use monzo::MonzoClient;
use publisher::Publisher;
use settings::{Settings, SettingsStore};
use store::{DataboxStore, register_datasources};
use tokio::sync::Mutex;

pub struct AppState {
    settings: SettingsStore,
    monzo: MonzoClient,
    publisher: Publisher,
    schedule: Mutex<Schedule>,
    auth_url: String,
    token_refresh_interval: TimeDelta,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ui", get(ui))
        .route("/oauth/callback", get(callback))
        .route("/configure", get(configure))
        .route("/saveConfiguration", get(save_configuration))
        .route("/status", get(status))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    let _log_guard = setup_logging(&args.base_log_dir);

    let defaults = Settings::defaults_from_file(&args.default_settings, &args.redirect_uri)
        .expect("Failed to read default settings");

    let timeout = Duration::from_secs(args.request_timeout);
    let store = Arc::new(
        DataboxStore::new(&args.store_endpoint, timeout).expect("Failed to create store client"),
    );
    let monzo = MonzoClient::new(&args.api_url, timeout).expect("Failed to create Monzo client");

    register_datasources(store.as_ref(), store.as_ref()).await;

    let app_state = Arc::new(AppState {
        settings: SettingsStore::new(store.clone(), defaults, args.settings_access),
        monzo,
        publisher: Publisher::new(store),
        schedule: Mutex::new(Schedule::default()),
        auth_url: args.auth_url,
        token_refresh_interval: TimeDelta::minutes(args.token_refresh_interval.into()),
    });

    tracing::info!("Spawning refresh task...");
    tokio::spawn(refresh_task(
        app_state.clone(),
        Duration::from_secs(args.tick_interval),
    ));

    let app = router(app_state);
    let bind_address = SocketAddr::from(([0, 0, 0, 0], args.port));

    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            let config = RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("Failed to load HTTPS credentials");

            tracing::info!("Server listening on https://{}...", bind_address);
            axum_server::bind_rustls(bind_address, config)
                .serve(app.into_make_service())
                .await
                .unwrap();
        }
        _ => {
            tracing::info!("Server listening on http://{}...", bind_address);
            let listener = tokio::net::TcpListener::bind(bind_address).await.unwrap();
            axum::serve(listener, app).await.unwrap();
        }
    }
}
