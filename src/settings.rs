use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::args::SettingsAccess;
use crate::store::{KeyValueStore, SETTINGS_DATASOURCE_ID, StoreError};

const SETTINGS_KEY: &str = "settings";

/// Token response from the Monzo token endpoint, kept whole so that fields
/// such as `user_id` survive a round trip through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthDetails {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthDetails {
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_details: Option<AuthDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    /// Loads the bundled OAuth application credentials and pins the redirect
    /// URI to the local callback.
    pub fn defaults_from_file(
        path: impl AsRef<Path>,
        redirect_uri: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut settings: Settings = serde_json::from_str(&contents)?;
        settings.redirect_uri = redirect_uri.to_string();
        Ok(settings)
    }
}

pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
    defaults: Settings,
    write_lock: Option<Mutex<()>>,
}

impl SettingsStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, defaults: Settings, access: SettingsAccess) -> Self {
        let write_lock = match access {
            SettingsAccess::Serialized => Some(Mutex::new(())),
            SettingsAccess::Unsynchronized => None,
        };

        Self {
            kv,
            defaults,
            write_lock,
        }
    }

    /// Reads the stored record without applying defaults. `Ok(None)` means
    /// the driver has never been configured.
    pub async fn load_settings(&self) -> Result<Option<Settings>, StoreError> {
        match self.kv.read(SETTINGS_DATASOURCE_ID, SETTINGS_KEY).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn get_settings(&self) -> Settings {
        match self.load_settings().await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                tracing::debug!("No stored settings, using defaults");
                self.defaults.clone()
            }
            Err(err) => {
                tracing::warn!("Unable to read settings, using defaults: {}", err);
                self.defaults.clone()
            }
        }
    }

    pub async fn set_settings(&self, settings: Settings) -> Result<Settings, StoreError> {
        let value = serde_json::to_value(&settings)?;
        self.kv
            .write(SETTINGS_DATASOURCE_ID, SETTINGS_KEY, &value)
            .await
            .inspect_err(|err| tracing::error!("Error saving settings: {}", err))?;

        tracing::debug!("Settings saved");
        Ok(settings)
    }

    /// Read-modify-write of the settings record. In serialized mode no other
    /// `update` interleaves between the read and the write. A failed or
    /// undecodable read aborts the update so the stored record is never
    /// replaced by defaults.
    pub async fn update<F>(&self, apply: F) -> Result<Settings, StoreError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = match &self.write_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let mut settings = self
            .load_settings()
            .await
            .inspect_err(|err| tracing::error!("Unable to read settings for update: {}", err))?
            .unwrap_or_else(|| self.defaults.clone());
        apply(&mut settings);
        self.set_settings(settings).await
    }
}
