//! Bearer-token minting
//!
//! The signer is built once at startup from the configured PEM key pair and
//! algorithm name; requests only ever see an immutable reference to it.
//! Tokens are compact JWS structures whose claims follow the Docker Registry
//! token specification.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::error;

use crate::config::TokenConfig;
use crate::error::AuthError;
use crate::scope::Scope;

/// Signing algorithms the service accepts at startup
const SUPPORTED_ALGORITHMS: &[(&str, Algorithm)] = &[
    ("RS256", Algorithm::RS256),
    ("RS384", Algorithm::RS384),
    ("RS512", Algorithm::RS512),
    ("ES256", Algorithm::ES256),
    ("ES384", Algorithm::ES384),
];

/// Bytes of the certificate digest kept in the key identifier
const KEY_ID_DIGEST_BYTES: usize = 15;

/// Length of the random `jti` claim in bytes
const TOKEN_ID_BYTES: usize = 16;

/// Signing-key setup failures; all of these are fatal at startup
#[derive(Debug, Error)]
pub enum KeyError {
    /// Algorithm name outside the supported set
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key or certificate file could not be read
    #[error("Failed to read key material: {0}")]
    Io(#[from] std::io::Error),

    /// Key material does not match the configured algorithm
    #[error("Invalid signing key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

/// One access grant embedded in a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub actions: Vec<String>,
}

/// Registered claims of an issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    pub jti: String,
    /// Single-entry grant; absent for auth-only tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<Vec<AccessEntry>>,
}

/// Token signer, constructed once at startup and shared read-only
pub struct Signer {
    algorithm: Algorithm,
    key: EncodingKey,
    key_id: String,
    issuer: String,
    expiration_secs: i64,
}

impl Signer {
    /// Load key material from the files named in `config`
    pub fn from_config(config: &TokenConfig) -> Result<Signer, KeyError> {
        let key_pem = std::fs::read(&config.key)?;
        let cert_pem = std::fs::read(&config.certificate)?;
        Signer::from_pem(
            &config.algorithm,
            &key_pem,
            &cert_pem,
            &config.issuer,
            config.expiration_secs,
        )
    }

    /// Build a signer from in-memory PEM material
    ///
    /// Resolves `algorithm` against the supported set and checks that the
    /// private key actually parses for that algorithm family. This is the
    /// startup self-check; nothing about the key is revalidated per request.
    pub fn from_pem(
        algorithm: &str,
        key_pem: &[u8],
        cert_pem: &[u8],
        issuer: &str,
        expiration_secs: i64,
    ) -> Result<Signer, KeyError> {
        let algorithm = resolve_algorithm(algorithm)?;
        let key = match algorithm {
            Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(key_pem)?,
            _ => EncodingKey::from_rsa_pem(key_pem)?,
        };
        Ok(Signer {
            algorithm,
            key,
            key_id: derive_key_id(cert_pem),
            issuer: issuer.to_string(),
            expiration_secs,
        })
    }

    /// Identifier of the loaded key, embedded in every token header
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Mint a signed token for `account` covering `granted`
    ///
    /// An empty granted scope produces a token without an access claim,
    /// which authenticates the caller without authorizing anything.
    pub fn create_token(
        &self,
        granted: &Scope,
        service: &str,
        account: &str,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let access = if granted.is_empty() {
            None
        } else {
            Some(vec![AccessEntry {
                resource_type: granted.resource_type.clone(),
                name: granted.name.clone(),
                actions: granted
                    .actions
                    .actions()
                    .iter()
                    .map(|a| a.to_string())
                    .collect(),
            }])
        };

        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: account.to_string(),
            aud: service.to_string(),
            exp: now + self.expiration_secs,
            // one second of clock-skew tolerance
            nbf: now - 1,
            iat: now,
            jti: random_token_id(),
            access,
        };

        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.key_id.clone());

        encode(&header, &claims, &self.key).map_err(|e| {
            error!(error = %e, "failed to sign token");
            AuthError::Internal
        })
    }
}

fn resolve_algorithm(name: &str) -> Result<Algorithm, KeyError> {
    SUPPORTED_ALGORITHMS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, algorithm)| *algorithm)
        .ok_or_else(|| KeyError::UnsupportedAlgorithm(name.to_string()))
}

/// Derive a stable key identifier from the certificate bytes
fn derive_key_id(cert_pem: &[u8]) -> String {
    let digest = Sha256::digest(cert_pem);
    URL_SAFE_NO_PAD.encode(&digest[..KEY_ID_DIGEST_BYTES])
}

/// Random token id; unique in practice, not a cryptographic commitment
fn random_token_id() -> String {
    let mut bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
