use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const BALANCE_DATASOURCE_ID: &str = "monzoUserBalance";
pub const TRANSACTIONS_DATASOURCE_ID: &str = "monzoUserTransactions";
pub const SETTINGS_DATASOURCE_ID: &str = "monzoSettings";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to store failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store responded with status_code={status}: {body}")]
    Status { status: u16, body: String },
    #[error("unable to encode or decode store payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Ts,
    Kv,
}

/// Describes a data source to the store catalogue before anything is read or
/// written against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceMetadata {
    pub description: &'static str,
    pub content_type: &'static str,
    pub vendor: &'static str,
    #[serde(rename = "datasourcetype")]
    pub datasource_type: &'static str,
    #[serde(rename = "datasourceid")]
    pub datasource_id: &'static str,
    pub store_type: StoreType,
}

impl DataSourceMetadata {
    const fn json(
        description: &'static str,
        datasource_id: &'static str,
        store_type: StoreType,
    ) -> Self {
        Self {
            description,
            content_type: "application/json",
            vendor: "Databox Inc.",
            datasource_type: datasource_id,
            datasource_id,
            store_type,
        }
    }
}

pub const BALANCE_DATASOURCE: DataSourceMetadata = DataSourceMetadata::json(
    "Monzo Bank user Balance data",
    BALANCE_DATASOURCE_ID,
    StoreType::Ts,
);

pub const TRANSACTIONS_DATASOURCE: DataSourceMetadata = DataSourceMetadata::json(
    "Monzo Bank user Transactions data",
    TRANSACTIONS_DATASOURCE_ID,
    StoreType::Ts,
);

pub const SETTINGS_DATASOURCE: DataSourceMetadata = DataSourceMetadata::json(
    "Monzo driver settings",
    SETTINGS_DATASOURCE_ID,
    StoreType::Kv,
);

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when nothing has been written under `key` yet.
    async fn read(&self, datasource_id: &str, key: &str) -> Result<Option<Value>, StoreError>;

    async fn write(&self, datasource_id: &str, key: &str, value: &Value)
    -> Result<(), StoreError>;

    async fn register_datasource(&self, metadata: &DataSourceMetadata) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn write(&self, datasource_id: &str, payload: &Value) -> Result<(), StoreError>;

    async fn register_datasource(&self, metadata: &DataSourceMetadata) -> Result<(), StoreError>;
}

/// Client for the Databox core store HTTP API. Serves as both the key-value
/// and the time-series store.
pub struct DataboxStore {
    client: reqwest::Client,
    endpoint: String,
}

impl DataboxStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(&self, url: String, body: &impl Serialize) -> Result<(), StoreError> {
        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("Error occurred in request to store url={}: {:#?}", &url, err)
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn register(&self, metadata: &DataSourceMetadata) -> Result<(), StoreError> {
        tracing::info!(
            "Registering datasource id={} store_type={:?}",
            metadata.datasource_id,
            metadata.store_type
        );

        self.post_json(format!("{}/cat", self.endpoint), metadata)
            .await
    }
}

#[async_trait]
impl KeyValueStore for DataboxStore {
    async fn read(&self, datasource_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let url = format!("{}/kv/{}/{}", self.endpoint, datasource_id, key);

        let res = self.client.get(&url).send().await.inspect_err(|err| {
            tracing::error!("Error occurred in request to store url={}: {:#?}", &url, err)
        })?;

        let status = res.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }

        let body = res.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<Value>(&body)? {
            Value::Null => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            value => Ok(Some(value)),
        }
    }

    async fn write(
        &self,
        datasource_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<(), StoreError> {
        self.post_json(
            format!("{}/kv/{}/{}", self.endpoint, datasource_id, key),
            value,
        )
        .await
    }

    async fn register_datasource(&self, metadata: &DataSourceMetadata) -> Result<(), StoreError> {
        self.register(metadata).await
    }
}

#[async_trait]
impl TimeSeriesStore for DataboxStore {
    async fn write(&self, datasource_id: &str, payload: &Value) -> Result<(), StoreError> {
        self.post_json(
            format!("{}/ts/blob/{}", self.endpoint, datasource_id),
            payload,
        )
        .await
    }

    async fn register_datasource(&self, metadata: &DataSourceMetadata) -> Result<(), StoreError> {
        self.register(metadata).await
    }
}

/// Registers the balance and transactions streams and the settings namespace.
/// Failures are logged; the driver keeps running without them.
pub async fn register_datasources(kv: &dyn KeyValueStore, ts: &dyn TimeSeriesStore) {
    let result = async {
        ts.register_datasource(&BALANCE_DATASOURCE).await?;
        ts.register_datasource(&TRANSACTIONS_DATASOURCE).await?;
        kv.register_datasource(&SETTINGS_DATASOURCE).await
    }
    .await;

    match result {
        Ok(()) => tracing::info!("Registered datasources"),
        Err(err) => tracing::error!("Error registering datasource: {}", err),
    }
}
