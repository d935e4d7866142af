//! API-backed item sources and action sinks.

use std::sync::Arc;

use crate::api::types::UserSummary;
use crate::api::{ApiClient, ApiClientError};
use crate::auth::Credentials;
use crate::list::optimistic::{FollowAction, PostAction, PostCard};
use crate::list::{ActionSink, ItemSource};

fn bearer(credentials: &dyn Credentials) -> Result<String, ApiClientError> {
    credentials
        .access_token()
        .ok_or(ApiClientError::NotAuthenticated)
}

#[derive(Clone)]
pub struct PostSource {
    api: Arc<ApiClient>,
    credentials: Arc<dyn Credentials>,
}

impl PostSource {
    pub fn new(api: Arc<ApiClient>, credentials: Arc<dyn Credentials>) -> Self {
        Self { api, credentials }
    }
}

impl ItemSource<PostCard> for PostSource {
    async fn fetch(&self, id: u64) -> Result<PostCard, ApiClientError> {
        let post = self.api.get_post(id).await?;
        Ok(PostCard::new(post, self.credentials.user_id()))
    }
}

impl ActionSink<PostAction> for PostSource {
    async fn commit(&self, id: u64, action: &PostAction) -> Result<(), ApiClientError> {
        let token = bearer(self.credentials.as_ref())?;
        match action {
            PostAction::Like => self.api.like_post(id, &token).await,
            PostAction::Unlike => self.api.unlike_post(id, &token).await,
            PostAction::Save => self.api.save_post(id, &token).await,
            PostAction::Unsave => self.api.unsave_post(id, &token).await,
        }
    }
}

/// Users with relationship flags when logged in, public summaries otherwise.
#[derive(Clone)]
pub struct UserSource {
    api: Arc<ApiClient>,
    credentials: Arc<dyn Credentials>,
}

impl UserSource {
    pub fn new(api: Arc<ApiClient>, credentials: Arc<dyn Credentials>) -> Self {
        Self { api, credentials }
    }
}

impl ItemSource<UserSummary> for UserSource {
    async fn fetch(&self, id: u64) -> Result<UserSummary, ApiClientError> {
        match self.credentials.access_token() {
            Some(token) => self.api.get_mutual_summary(id, &token).await,
            None => self.api.get_user_summary(id).await,
        }
    }
}

impl ActionSink<FollowAction> for UserSource {
    async fn commit(&self, id: u64, action: &FollowAction) -> Result<(), ApiClientError> {
        let token = bearer(self.credentials.as_ref())?;
        match action {
            FollowAction::Follow => self.api.follow_user(id, &token).await,
            FollowAction::Unfollow => self.api.unfollow_user(id, &token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::stub::serve_once;

    struct Fixed(Option<(String, u64)>);

    impl Credentials for Fixed {
        fn access_token(&self) -> Option<String> {
            self.0.as_ref().map(|(t, _)| t.clone())
        }

        fn user_id(&self) -> Option<u64> {
            self.0.as_ref().map(|(_, id)| *id)
        }
    }

    fn client(base: &str) -> Arc<ApiClient> {
        Arc::new(ApiClient::with_urls(base, base, Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn post_flags_follow_the_viewer() {
        let (base, _captured) =
            serve_once("200 OK", r#"{"likeIds":[9],"likeCount":1,"savedIds":[]}"#).await;
        let source = PostSource::new(client(&base), Arc::new(Fixed(Some(("t".into(), 9)))));

        let card = source.fetch(12).await.unwrap();
        assert_eq!(card.post.id, 12);
        assert!(card.liked);
        assert!(!card.saved);
    }

    #[tokio::test]
    async fn anonymous_mutation_is_refused_locally() {
        let source = PostSource::new(client("http://127.0.0.1:9"), Arc::new(Fixed(None)));
        let err = source.commit(1, &PostAction::Like).await.unwrap_err();
        assert!(matches!(err, ApiClientError::NotAuthenticated));
    }

    #[tokio::test]
    async fn logged_in_user_fetch_uses_mutual_endpoint() {
        let (base, captured) = serve_once(
            "200 OK",
            r#"{"name":"dana","follows":true,"followsBack":false}"#,
        )
        .await;
        let source = UserSource::new(client(&base), Arc::new(Fixed(Some(("tok".into(), 1)))));

        let user = source.fetch(6).await.unwrap();
        assert_eq!(user.id, 6);
        assert!(user.follows);

        let captured = captured.await.unwrap();
        assert_eq!(captured.request_line, "GET /api/follow/mutual/6 HTTP/1.1");
    }

    #[tokio::test]
    async fn unfollow_sends_delete() {
        let (base, captured) = serve_once("200 OK", "").await;
        let source = UserSource::new(client(&base), Arc::new(Fixed(Some(("tok".into(), 1)))));

        source.commit(6, &FollowAction::Unfollow).await.unwrap();

        let captured = captured.await.unwrap();
        assert_eq!(captured.request_line, "DELETE /api/follow/6 HTTP/1.1");
    }
}
