use crate::api::ApiClient;
use crate::api::types::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};
use crate::auth::{AuthBackend, AuthError, LoginGrant};

impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, AuthError> {
        let resp: LoginResponse = self
            .post_json(&self.auth_url("/auth/login"), &LoginRequest { email, password })
            .await?;
        LoginGrant::try_from(resp)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let resp: RefreshResponse = self
            .post_json(
                &self.auth_url("/auth/refresh"),
                &RefreshRequest { refresh_token },
            )
            .await?;
        resp.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Malformed("refresh response missing accessToken".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::api::stub::serve_once;
    use crate::api::{ApiClient, ApiClientError};
    use crate::auth::{AuthBackend, AuthError};

    #[tokio::test]
    async fn refresh_posts_token_and_returns_access_token() {
        let (base, captured) = serve_once("200 OK", r#"{"accessToken":"fresh"}"#).await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        let token = client.refresh("r-1").await.unwrap();
        assert_eq!(token, "fresh");

        let captured = captured.await.unwrap();
        assert_eq!(captured.request_line, "POST /auth/refresh HTTP/1.1");
        let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(body["refreshToken"], "r-1");
    }

    #[tokio::test]
    async fn expired_refresh_token_is_unauthorized() {
        let (base, _captured) = serve_once("401 Unauthorized", "expired").await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        let err = client.refresh("r-1").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Api(ApiClientError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn refresh_without_token_is_malformed() {
        let (base, _captured) = serve_once("200 OK", "{}").await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            client.refresh("r-1").await,
            Err(AuthError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn login_builds_grant() {
        let (base, captured) = serve_once(
            "200 OK",
            r#"{"userId":3,"name":"Flo","email":"flo@fixit.test","accessToken":"a","refreshToken":"r"}"#,
        )
        .await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        let grant = client.login("flo@fixit.test", "pw").await.unwrap();
        assert_eq!(grant.identity.user_id, 3);
        assert_eq!(grant.tokens.refresh_token, "r");

        let captured = captured.await.unwrap();
        assert_eq!(captured.request_line, "POST /auth/login HTTP/1.1");
    }
}
