// src/ledger/http.rs

//! Blocking HTTP implementation of the ledger contract
//!
//! Single attempt per call, fixed timeout, uniform error mapping: any
//! transport failure or non-2xx response becomes [`Error::Remote`].
//! Authentication is attached per request; an API key wins over basic
//! credentials when both are configured.

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::host::HostIdentity;
use crate::ledger::{
    ExecutionRecord, KnownTransaction, Ledger, MachineRecord, StoredTransaction, TransactionRecord,
};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Per-request authentication, resolved once from the configuration
enum Auth {
    ApiKey(String),
    Basic { username: String, password: String },
    Anonymous,
}

/// HTTP client for the ledger server
pub struct HttpLedger {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl HttpLedger {
    /// Build a client from the agent configuration
    pub fn from_config(config: &AgentConfig) -> Result<HttpLedger> {
        let base_url = config.server_url()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.server.timeout_secs))
            .build()
            .map_err(|e| Error::Remote(format!("failed to create HTTP client: {e}")))?;

        let auth = if !config.server.api_key.is_empty() {
            Auth::ApiKey(config.server.api_key.clone())
        } else if !config.server.username.is_empty() {
            Auth::Basic {
                username: config.server.username.clone(),
                password: config.server.password.clone(),
            }
        } else {
            Auth::Anonymous
        };

        Ok(HttpLedger {
            client,
            base_url,
            auth,
        })
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::ApiKey(key) => request.header("X-API-Key", key),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Anonymous => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");

        let response = self
            .authenticated(self.client.get(&url).query(query))
            .send()
            .map_err(|e| Error::Remote(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::remote_status(status.as_u16(), &body));
        }

        response
            .json()
            .map_err(|e| Error::Remote(format!("failed to decode response from {url}: {e}")))
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {url}");

        let response = self
            .authenticated(self.client.post(&url).json(body))
            .send()
            .map_err(|e| Error::Remote(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::remote_status(status.as_u16(), &body));
        }

        Ok(())
    }

    /// All stored transactions for a machine, for the `transactions` command
    pub fn list_transactions(&self, machine_id: &str) -> Result<Vec<StoredTransaction>> {
        self.get_json("/v1/transactions", &[("machine_id", machine_id)])
    }

    /// One stored transaction with its items, for the `items` command
    pub fn fetch_items(&self, machine_id: &str, transaction_id: u64) -> Result<StoredTransaction> {
        let id = transaction_id.to_string();
        self.get_json(
            "/v1/items",
            &[("machine_id", machine_id), ("transaction_id", id.as_str())],
        )
    }

    /// Execution records for a machine, for the `executions` command
    pub fn list_executions(&self, machine_id: &str) -> Result<Vec<ExecutionRecord>> {
        self.get_json("/v1/executions", &[("machine_id", machine_id)])
    }

    /// Machine ids registered for a hostname, for the `machine-id` command
    pub fn list_machine_ids(&self, hostname: &str) -> Result<Vec<MachineRecord>> {
        self.get_json("/v1/machines/ids", &[("hostname", hostname)])
    }
}

impl Ledger for HttpLedger {
    fn known_transaction_ids(&self, host: &HostIdentity) -> Result<HashSet<u64>> {
        let known: Vec<KnownTransaction> = self.get_json(
            "/v1/transactions",
            &[
                ("machine_id", host.machine_id.as_str()),
                ("hostname", host.hostname.as_str()),
            ],
        )?;

        Ok(known.into_iter().map(|t| t.transaction_id).collect())
    }

    fn push_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.post_json("/v1/transactions", record)
    }

    fn transaction_items(
        &self,
        machine_id: &str,
        transaction_id: u64,
    ) -> Result<StoredTransaction> {
        self.fetch_items(machine_id, transaction_id)
    }

    fn push_execution(&self, record: &ExecutionRecord) -> Result<()> {
        self.post_json("/v1/executions", record)
    }
}
