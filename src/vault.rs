//! Vault credential store client
//!
//! Resolves (namespace, account) pairs to a password and per-repository ACL
//! over the Vault KV HTTP API. The transport is one shared `reqwest` client
//! built from configuration; every lookup is a single bounded GET with no
//! retries and no caching, so each authorization decision sees live data.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{redirect, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::VaultConfig;
use crate::error::AuthError;
use crate::scope::Privilege;

/// How many redirects a lookup may follow (Vault HA leader redirection)
const MAX_REDIRECTS: usize = 2;

/// A user's record as stored in Vault, fetched fresh for every request
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    /// Repository name to granted actions
    pub access: HashMap<String, Privilege>,
}

/// Vault KV response envelope, `{"data": {"access": ..., "password": ...}}`
#[derive(Debug, Deserialize)]
struct Envelope {
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    access: String,
    password: String,
}

/// Client for the Vault credential store
///
/// Holds the single shared transport; safe to use from concurrent requests
/// since all state is read-only after construction.
#[derive(Debug)]
pub struct VaultClient {
    client: Client,
    base_url: String,
    auth_token: String,
}

impl VaultClient {
    /// Build the client and its transport from configuration
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .redirect(redirect::Policy::limited(MAX_REDIRECTS))
                .build()
                .expect("Failed to create Vault HTTP client"),
            base_url: config.base_url(),
            auth_token: config.auth_token.clone(),
        }
    }

    /// Fetch the record for `account` under `namespace`
    ///
    /// # Arguments
    ///
    /// * `request_id` - correlation id of the token request being served
    /// * `namespace` - Vault mount the accounts live under (the service name)
    /// * `account` - account to look up
    ///
    /// # Errors
    ///
    /// `Forbidden` when Vault does not know the user (404), `Internal` for
    /// transport failures, payload problems and store-permission errors
    /// (403 is deliberately not forwarded), `Upstream` for any other status.
    pub async fn retrieve_user(
        &self,
        request_id: u32,
        namespace: &str,
        account: &str,
    ) -> Result<UserRecord, AuthError> {
        let url = format!("{}/v1/{}/{}", self.base_url, namespace, account);
        debug!(request_id, url = %url, "credential store lookup");

        let response = self
            .client
            .get(&url)
            .header("X-Vault-Token", &self.auth_token)
            .send()
            .await
            .map_err(|e| {
                warn!(request_id, error = %e, "error while communicating with the credential store");
                AuthError::Internal
            })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::FORBIDDEN => {
                // The store token lacks permission; that detail stays inside.
                warn!(request_id, "credential store token does not have enough permissions");
                return Err(AuthError::Internal);
            }
            StatusCode::NOT_FOUND => {
                debug!(request_id, account, "credential store has no such user");
                return Err(AuthError::Forbidden);
            }
            status => {
                warn!(request_id, status = status.as_u16(), "unexpected credential store status");
                return Err(AuthError::Upstream(status.as_u16()));
            }
        }

        let envelope: Envelope = response.json().await.map_err(|e| {
            warn!(request_id, error = %e, "failed to decode credential store response");
            AuthError::Internal
        })?;

        let access = parse_access(&envelope.data.access).map_err(|entry| {
            warn!(request_id, entry = %entry, "malformed access entry in credential store record");
            AuthError::Internal
        })?;

        Ok(UserRecord {
            username: account.to_string(),
            password: envelope.data.password,
            access,
        })
    }
}

/// Parse the `;`-separated ACL string from a Vault record
///
/// Each entry must be a full `type:name:actions` triple with a legal
/// privilege; one bad entry fails the whole record rather than producing a
/// partial ACL. Returns the offending entry on failure.
fn parse_access(text: &str) -> Result<HashMap<String, Privilege>, String> {
    let mut access = HashMap::new();
    for entry in text.split(';') {
        let fields: Vec<&str> = entry.split(':').collect();
        if fields.len() != 3 {
            return Err(entry.to_string());
        }
        let privilege = Privilege::parse(fields[2]);
        if !privilege.is_valid() {
            return Err(entry.to_string());
        }
        access.insert(fields[1].to_string(), privilege);
    }
    Ok(access)
}
