//! Authentication for the FixIt API.
//!
//! Login and renewal are delegated to an external auth server that issues a
//! short-lived JWT access token and a long-lived refresh token.

pub mod jwt;
pub mod session;
pub mod storage;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiClientError;
use crate::api::types::LoginResponse;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Api(#[from] ApiClientError),
    #[error("malformed auth response: {0}")]
    Malformed(String),
    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),
    #[error("auth request timed out")]
    Timeout,
}

/// Who is logged in. Persisted as JSON under the `user` storage key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub is_google: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity and tokens returned by a successful login.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub identity: Identity,
    pub tokens: Tokens,
}

impl TryFrom<LoginResponse> for LoginGrant {
    type Error = AuthError;

    fn try_from(resp: LoginResponse) -> Result<Self, Self::Error> {
        let access_token = resp
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Malformed("login response missing accessToken".into()))?;
        let refresh_token = resp
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Malformed("login response missing refreshToken".into()))?;

        Ok(Self {
            identity: Identity {
                user_id: resp.user_id.unwrap_or_default(),
                name: resp.name,
                email: resp.email,
                profile_pic: resp.profile_pic,
                is_google: resp.is_google,
            },
            tokens: Tokens {
                access_token,
                refresh_token,
            },
        })
    }
}

/// The remote side of the session: password login and access-token renewal.
pub trait AuthBackend: Send + Sync {
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<LoginGrant, AuthError>> + Send;

    /// Exchange a refresh token for a new access token.
    fn refresh(&self, refresh_token: &str)
    -> impl Future<Output = Result<String, AuthError>> + Send;
}

/// Read access to the current credential, for code that issues API calls.
///
/// `None` means "do not attempt an authenticated request".
pub trait Credentials: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn user_id(&self) -> Option<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(access: Option<&str>, refresh: Option<&str>) -> LoginResponse {
        serde_json::from_value(serde_json::json!({
            "userId": 4,
            "name": "Dee",
            "email": "dee@fixit.test",
            "accessToken": access,
            "refreshToken": refresh,
        }))
        .unwrap()
    }

    #[test]
    fn grant_from_complete_response() {
        let grant = LoginGrant::try_from(response(Some("a"), Some("r"))).unwrap();
        assert_eq!(grant.identity.user_id, 4);
        assert_eq!(grant.identity.name, "Dee");
        assert_eq!(grant.tokens.access_token, "a");
        assert_eq!(grant.tokens.refresh_token, "r");
    }

    #[test]
    fn grant_requires_both_tokens() {
        assert!(matches!(
            LoginGrant::try_from(response(Some("a"), None)),
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(
            LoginGrant::try_from(response(Some(""), Some("r"))),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn identity_round_trips_as_camel_case() {
        let identity = Identity {
            user_id: 11,
            name: "Eli".into(),
            email: "eli@fixit.test".into(),
            profile_pic: None,
            is_google: true,
        };
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["userId"], 11);
        assert_eq!(json["isGoogle"], true);
    }
}
