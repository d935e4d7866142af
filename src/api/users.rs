use reqwest::Method;

use crate::api::types::{FollowStatus, ProfileData, PublicUserSummary, UserSummary};
use crate::api::{ApiClient, ApiClientError};

impl ApiClient {
    /// IDs of every user. The token, when present, lets the server tailor the list.
    pub async fn get_user_ids(&self, token: Option<&str>) -> Result<Vec<u64>, ApiClientError> {
        self.get_json(&self.url("/api/user/all-ids"), token).await
    }

    /// Public summary for anonymous viewers; relationship flags are always false.
    pub async fn get_user_summary(&self, user_id: u64) -> Result<UserSummary, ApiClientError> {
        let summary: PublicUserSummary = self
            .get_json(&self.url(&format!("/api/user/summary/{user_id}")), None)
            .await?;
        Ok(UserSummary {
            id: user_id,
            name: summary.name,
            profile_pic: summary.profile_pic,
            follows: false,
            follows_back: false,
        })
    }

    /// Summary including the viewer's follow relationship with `user_id`.
    pub async fn get_mutual_summary(
        &self,
        user_id: u64,
        token: &str,
    ) -> Result<UserSummary, ApiClientError> {
        let mut summary: UserSummary = self
            .get_json(
                &self.url(&format!("/api/follow/mutual/{user_id}")),
                Some(token),
            )
            .await?;
        summary.id = user_id;
        Ok(summary)
    }

    pub async fn get_follow_status(
        &self,
        user_id: u64,
        token: &str,
    ) -> Result<FollowStatus, ApiClientError> {
        self.get_json(
            &self.url(&format!("/api/follow/mutual/{user_id}")),
            Some(token),
        )
        .await
    }

    /// The viewer's own profile (includes saved posts); requires a token.
    pub async fn get_own_profile(
        &self,
        user_id: u64,
        token: &str,
    ) -> Result<ProfileData, ApiClientError> {
        self.get_json(&self.url(&format!("/api/user/{user_id}")), Some(token))
            .await
    }

    /// Another user's public profile.
    pub async fn get_profile(&self, user_id: u64) -> Result<ProfileData, ApiClientError> {
        self.get_json(&self.url(&format!("/api/user/{user_id}/profile")), None)
            .await
    }

    pub async fn follow_user(&self, user_id: u64, token: &str) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/api/follow/{user_id}"));
        self.send_mutation(Method::POST, &url, token).await
    }

    pub async fn unfollow_user(&self, user_id: u64, token: &str) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/api/follow/{user_id}"));
        self.send_mutation(Method::DELETE, &url, token).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::api::stub::serve_once;
    use crate::api::{ApiClient, ApiClientError};

    #[tokio::test]
    async fn anonymous_summary_has_no_relationship() {
        let (base, _captured) = serve_once("200 OK", r#"{"name":"cleo"}"#).await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        let user = client.get_user_summary(3).await.unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.name, "cleo");
        assert!(!user.follows && !user.follows_back);
    }

    #[tokio::test]
    async fn follow_rejected_by_server() {
        let (base, _captured) = serve_once("200 OK", "false").await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        let err = client.follow_user(3, "tok").await.unwrap_err();
        assert!(matches!(err, ApiClientError::Rejected));
    }
}
