use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::settings::AuthDetails;

pub type TokenResponse = AuthDetails;

#[derive(Debug, Error)]
pub enum MonzoError {
    #[error("request to monzo api failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("monzo api responded with status_code={status}: {body}")]
    Status { status: u16, body: String },
    #[error("unable to deserialise monzo api response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    pub id: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Deserialize)]
struct ListAccountsResponse {
    accounts: Vec<Account>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Balance {
    pub balance: i64,
    pub currency: String,
    #[serde(default)]
    pub total_balance: Option<i64>,
    #[serde(default)]
    pub spend_today: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Transactions are forwarded to the store as Monzo returns them, so beyond
/// the id every field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Transaction {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListTransactionsResponse {
    transactions: Vec<Transaction>,
}

#[derive(Clone)]
pub struct MonzoClient {
    client: reqwest::Client,
    api_url: String,
}

impl MonzoClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, MonzoError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<TokenResponse, MonzoError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("code", code),
        ];

        self.token_request(&params).await
    }

    pub async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, MonzoError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ];

        self.token_request(&params).await
    }

    pub async fn list_accounts(&self, auth: &AuthDetails) -> Result<Vec<Account>, MonzoError> {
        tracing::info!("Listing accounts...");

        let res = self
            .client
            .get(format!("{}/accounts", self.api_url))
            .header(reqwest::header::AUTHORIZATION, auth.authorization_header())
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!(
                    "Error occurred in request to Monzo accounts API: {:#?}",
                    err
                )
            })?;

        parse_response::<ListAccountsResponse>(res)
            .await
            .map(|res| res.accounts)
    }

    pub async fn get_balance(
        &self,
        auth: &AuthDetails,
        account_id: &str,
    ) -> Result<Balance, MonzoError> {
        tracing::info!("Fetching balance for account_id={}", account_id);

        let res = self
            .client
            .get(format!("{}/balance", self.api_url))
            .header(reqwest::header::AUTHORIZATION, auth.authorization_header())
            .query(&[("account_id", account_id)])
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("Error occurred in request to Monzo balance API: {:#?}", err)
            })?;

        parse_response::<Balance>(res).await
    }

    pub async fn get_transactions(
        &self,
        auth: &AuthDetails,
        account_id: &str,
    ) -> Result<Vec<Transaction>, MonzoError> {
        tracing::info!("Listing transactions for account_id={}", account_id);

        let res = self
            .client
            .get(format!("{}/transactions", self.api_url))
            .header(reqwest::header::AUTHORIZATION, auth.authorization_header())
            .query(&[("account_id", account_id)])
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!(
                    "Error occurred in request to Monzo transaction API: {:#?}",
                    err
                )
            })?;

        parse_response::<ListTransactionsResponse>(res)
            .await
            .map(|res| res.transactions)
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, MonzoError> {
        let res = self
            .client
            .post(format!("{}/oauth2/token", self.api_url))
            .form(params)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("Error occurred in request to Monzo token API: {:#?}", err);
            })?;

        parse_response::<TokenResponse>(res).await
    }
}

async fn parse_response<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, MonzoError> {
    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        tracing::error!("Monzo API returned status_code={} body={}", status, &body);
        return Err(MonzoError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|err| {
        tracing::error!("Error occurred while deserialising Monzo response: {:#?}", err);
        MonzoError::Malformed(err)
    })
}
