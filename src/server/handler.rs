//! The token request pipeline behind `GET /auth`
//!
//! Each request walks parse → authenticate → authorize → mint, strictly in
//! that order, short-circuiting with a classified error at the first failed
//! gate. Every step logs a structured line correlated by a per-request
//! random id that is threaded through explicitly.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::scope::{Privilege, Scope, RESOURCE_TYPE_REPOSITORY};
use crate::server::AppState;
use crate::vault::UserRecord;

/// Query parameters of a token request
///
/// Everything is optional at the HTTP layer; [`parse_request`] decides what
/// is actually required.
#[derive(Debug, Deserialize)]
pub struct AuthParams {
    pub service: Option<String>,
    pub account: Option<String>,
    pub scope: Option<String>,
}

/// A validated token request, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub service: String,
    pub account: String,
    pub password: String,
    pub scope: Option<Scope>,
}

/// Successful response body
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Handler for the token endpoint
pub async fn auth_handler(
    State(state): State<AppState>,
    Query(params): Query<AuthParams>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let request_id: u32 = rand::random();
    debug!(
        request_id,
        service = ?params.service,
        account = ?params.account,
        scope = ?params.scope,
        "token request received"
    );

    let request = match parse_request(&params, &headers) {
        Ok(request) => request,
        Err(e) => {
            info!(request_id, error = %e, "request rejected");
            return Err(e);
        }
    };

    // At least one of account and scope must be present: an account alone
    // authenticates, a scope alone would be an anonymous request.
    if request.account.is_empty() && request.scope.is_none() {
        info!(request_id, "rejected: neither account nor scope supplied");
        return Err(AuthError::BadRequest("malformed scope".to_string()));
    }

    // Anonymous repository access is not supported.
    if request.account.is_empty() {
        info!(request_id, "rejected: anonymous scoped request");
        return Err(AuthError::Unauthorized);
    }

    // Docker clients sometimes send the account without basic auth.
    if request.password.is_empty() {
        info!(request_id, account = %request.account, "rejected: missing credentials");
        return Err(AuthError::Unauthorized);
    }

    let user = match authenticate(&state, request_id, &request).await {
        Ok(user) => user,
        Err(e) => {
            info!(request_id, account = %request.account, error = %e, "authentication failed");
            return Err(e);
        }
    };

    let granted = action_allowed(request.scope.as_ref(), &user);
    debug!(
        request_id,
        repository = %granted.name,
        actions = ?granted.actions.actions(),
        "scope evaluated"
    );

    let token = state
        .signer
        .create_token(&granted, &request.service, &request.account)?;

    info!(request_id, account = %request.account, service = %request.service, "auth granted");
    Ok(Json(TokenResponse { token }).into_response())
}

/// Extract and cross-check the request parameters
///
/// The account may arrive both as a query parameter and as the basic-auth
/// user; when both are present they must agree, and the basic-auth user
/// wins as the canonical spelling.
pub fn parse_request(params: &AuthParams, headers: &HeaderMap) -> Result<AuthRequest, AuthError> {
    let service = params
        .service
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::BadRequest("missing service from the request".to_string()))?;

    let scope = match params.scope.as_deref().filter(|s| !s.is_empty()) {
        Some(text) => Some(
            text.parse::<Scope>()
                .map_err(|e| AuthError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let mut account = params.account.clone().unwrap_or_default();
    let mut password = String::new();
    if let Some((user, pass)) = basic_credentials(headers) {
        if !account.is_empty() && user != account {
            return Err(AuthError::BadRequest(
                "account and basic auth user are different".to_string(),
            ));
        }
        account = user;
        password = pass;
    }

    Ok(AuthRequest {
        service,
        account,
        password,
        scope,
    })
}

/// Decode HTTP basic credentials if the request carries any
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Look the account up in the credential store and check its password
///
/// The lookup is bounded by the handler deadline on top of the store
/// client's own timeout; whichever elapses first cancels the call. A wrong
/// password gets the same Forbidden as an unknown user, so the response
/// never reveals whether the account exists.
async fn authenticate(
    state: &AppState,
    request_id: u32,
    request: &AuthRequest,
) -> Result<UserRecord, AuthError> {
    let lookup = state
        .vault
        .retrieve_user(request_id, &request.service, &request.account);

    let user = match timeout(state.handler_timeout, lookup).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(request_id, "credential store lookup exceeded the request deadline");
            return Err(AuthError::Internal);
        }
    };

    if user.password != request.password {
        return Err(AuthError::Forbidden);
    }
    Ok(user)
}

/// Intersect the requested scope with what the user's ACL grants
///
/// Never grants beyond the ACL; a partially covered request is silently
/// downgraded to the covered actions, and a fully uncovered one degrades to
/// the empty scope rather than erroring.
pub fn action_allowed(requested: Option<&Scope>, user: &UserRecord) -> Scope {
    let requested = match requested {
        Some(scope) => scope,
        None => return Scope::empty(),
    };

    let allowed = user
        .access
        .get(&requested.name)
        .copied()
        .unwrap_or(Privilege::ILLEGAL);

    if allowed.has(requested.actions) {
        return requested.clone();
    }

    let overlap = allowed & requested.actions;
    if overlap.is_valid() {
        return Scope {
            resource_type: RESOURCE_TYPE_REPOSITORY.to_string(),
            name: requested.name.clone(),
            actions: overlap,
        };
    }

    Scope::empty()
}
