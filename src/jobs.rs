use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join;
use thiserror::Error;

use crate::{
    AppState,
    monzo::MonzoError,
    settings::Settings,
    store::{BALANCE_DATASOURCE_ID, StoreError, TRANSACTIONS_DATASOURCE_ID},
};

pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u32 = 30;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Provider(#[from] MonzoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// When the token and the data are next due. Unset means due on the next tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub next_token_refresh: Option<DateTime<Utc>>,
    pub next_data_refresh: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn token_refresh_due(&self, now: DateTime<Utc>) -> bool {
        self.next_token_refresh.is_none_or(|due| due <= now)
    }

    pub fn data_refresh_due(&self, now: DateTime<Utc>) -> bool {
        self.next_data_refresh.is_none_or(|due| due <= now)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Refresh {
    Done,
    Skipped(&'static str),
}

#[derive(Debug, PartialEq, Eq)]
pub enum DataRefresh {
    Done { interval: TimeDelta },
    Skipped(&'static str),
}

pub fn refresh_interval(settings: &Settings) -> TimeDelta {
    let minutes = match settings.refresh_interval.as_deref() {
        Some(value) => match value.trim().parse::<u32>() {
            Ok(minutes) if minutes > 0 => minutes,
            _ => {
                tracing::warn!(
                    "Invalid refresh_interval={}, falling back to {} minutes",
                    value,
                    DEFAULT_REFRESH_INTERVAL_MINUTES
                );
                DEFAULT_REFRESH_INTERVAL_MINUTES
            }
        },
        None => DEFAULT_REFRESH_INTERVAL_MINUTES,
    };

    TimeDelta::minutes(minutes.into())
}

pub async fn refresh_token(state: &AppState) -> Result<Refresh, RefreshError> {
    let settings = state.settings.get_settings().await;

    let Some(auth_details) = settings.auth_details else {
        return Ok(Refresh::Skipped("driver has not been authorised"));
    };
    let Some(refresh_token) = auth_details.refresh_token else {
        return Ok(Refresh::Skipped("no refresh token was issued"));
    };

    let token_response = state
        .monzo
        .refresh_token(&settings.client_id, &settings.client_secret, &refresh_token)
        .await?;

    state
        .settings
        .update(|settings| settings.auth_details = Some(token_response))
        .await?;

    Ok(Refresh::Done)
}

pub async fn refresh_data(state: &AppState) -> Result<DataRefresh, RefreshError> {
    let settings = state.settings.get_settings().await;
    let interval = refresh_interval(&settings);

    let (Some(auth_details), Some(account_id)) = (&settings.auth_details, &settings.account_id)
    else {
        return Ok(DataRefresh::Skipped("no account has been configured"));
    };

    let (balance, transactions) = join(
        state.monzo.get_balance(auth_details, account_id),
        state.monzo.get_transactions(auth_details, account_id),
    )
    .await;

    if let Ok(balance) = &balance {
        state.publisher.publish(BALANCE_DATASOURCE_ID, balance).await;
    }
    if let Ok(transactions) = &transactions {
        tracing::info!(
            "Retrieved {} transactions for account_id={}",
            transactions.len(),
            account_id
        );
        state
            .publisher
            .publish(TRANSACTIONS_DATASOURCE_ID, transactions)
            .await;
    }

    balance?;
    transactions?;

    Ok(DataRefresh::Done { interval })
}

/// Refreshes the token and reschedules it on success.
pub async fn run_token_refresh(state: &AppState, now: DateTime<Utc>) {
    match refresh_token(state).await {
        Ok(Refresh::Done) => {
            let next = now + state.token_refresh_interval;
            state.schedule.lock().await.next_token_refresh = Some(next);
            tracing::info!("Refreshed token, next refresh at {}", next);
        }
        Ok(Refresh::Skipped(reason)) => {
            tracing::debug!("Skipping token refresh: {}", reason);
        }
        Err(err) => {
            tracing::error!("An error occurred while refreshing the token: {}", err);
        }
    }
}

/// Refreshes balance and transactions and reschedules on success.
pub async fn run_data_refresh(state: &AppState, now: DateTime<Utc>) {
    match refresh_data(state).await {
        Ok(DataRefresh::Done { interval }) => {
            let next = now + interval;
            state.schedule.lock().await.next_data_refresh = Some(next);
            tracing::info!("Refreshed data, next refresh at {}", next);
        }
        Ok(DataRefresh::Skipped(reason)) => {
            tracing::debug!("Skipping data refresh: {}", reason);
        }
        Err(err) => {
            tracing::error!("An error occurred while refreshing data: {}", err);
        }
    }
}

pub async fn tick(state: &AppState, now: DateTime<Utc>) {
    let schedule = *state.schedule.lock().await;

    if schedule.token_refresh_due(now) {
        run_token_refresh(state, now).await;
    }

    if schedule.data_refresh_due(now) {
        run_data_refresh(state, now).await;
    }
}

pub async fn refresh_task(state: Arc<AppState>, tick_interval: std::time::Duration) {
    // Create a Tokio interval. The first tick fires immediately.
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        tracing::debug!("Running refresh tick...");

        tick(&state, Utc::now()).await;
    }
}
