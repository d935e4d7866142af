use reqwest::Method;

use crate::api::types::PostSummary;
use crate::api::{ApiClient, ApiClientError};

impl ApiClient {
    /// IDs of every post, newest first.
    pub async fn get_post_ids(&self) -> Result<Vec<u64>, ApiClientError> {
        self.get_json(&self.url("/api/post/all-ids"), None).await
    }

    /// Fetch a single post by ID.
    pub async fn get_post(&self, post_id: u64) -> Result<PostSummary, ApiClientError> {
        let mut post: PostSummary = self
            .get_json(&self.url(&format!("/api/post/{post_id}")), None)
            .await?;
        // The detail endpoint does not always echo the id back.
        post.id = post_id;
        Ok(post)
    }

    pub async fn like_post(&self, post_id: u64, token: &str) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/api/post/{post_id}/like"));
        self.send_mutation(Method::POST, &url, token).await
    }

    pub async fn unlike_post(&self, post_id: u64, token: &str) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/api/post/{post_id}/like"));
        self.send_mutation(Method::DELETE, &url, token).await
    }

    pub async fn save_post(&self, post_id: u64, token: &str) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/api/post/{post_id}/save"));
        self.send_mutation(Method::POST, &url, token).await
    }

    pub async fn unsave_post(&self, post_id: u64, token: &str) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/api/post/{post_id}/save"));
        self.send_mutation(Method::DELETE, &url, token).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::api::ApiClient;
    use crate::api::stub::serve_once;

    #[tokio::test]
    async fn get_post_fills_in_missing_id() {
        let (base, captured) =
            serve_once("200 OK", r#"{"description":"first","likeCount":3}"#).await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        let post = client.get_post(42).await.unwrap();
        assert_eq!(post.id, 42);
        assert_eq!(post.like_count, 3);

        let captured = captured.await.unwrap();
        assert_eq!(captured.request_line, "GET /api/post/42 HTTP/1.1");
    }

    #[tokio::test]
    async fn unlike_uses_delete() {
        let (base, captured) = serve_once("204 No Content", "").await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        client.unlike_post(5, "tok").await.unwrap();

        let captured = captured.await.unwrap();
        assert_eq!(captured.request_line, "DELETE /api/post/5/like HTTP/1.1");
    }
}
