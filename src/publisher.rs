use std::sync::Arc;

use serde::Serialize;

use crate::store::TimeSeriesStore;

/// Fire-and-forget writer for the time-series data sources. A dropped data
/// point is superseded by the next refresh.
pub struct Publisher {
    ts: Arc<dyn TimeSeriesStore>,
}

impl Publisher {
    pub fn new(ts: Arc<dyn TimeSeriesStore>) -> Self {
        Self { ts }
    }

    pub async fn publish<T: Serialize>(&self, datasource_id: &str, payload: &T) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(
                    "Error serialising payload for datasource_id={}: {}",
                    datasource_id,
                    err
                );
                return;
            }
        };

        match self.ts.write(datasource_id, &value).await {
            Ok(()) => tracing::info!("Saved data to datasource_id={}", datasource_id),
            Err(err) => tracing::error!(
                "Error writing to store datasource_id={}: {}",
                datasource_id,
                err
            ),
        }
    }
}
