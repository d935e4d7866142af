use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub author_id: Option<u64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_by_profile_pic_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub like_ids: Vec<u64>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_ids: Vec<u64>,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub saved_ids: Vec<u64>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub const DEFAULT_PROFILE_PIC: &str =
    "https://ui-avatars.com/api/?name=User&background=cccccc&color=222222&size=128";

/// A user row in explore / followers / following lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub follows: bool,
    #[serde(default)]
    pub follows_back: bool,
}

impl UserSummary {
    pub fn profile_pic(&self) -> &str {
        self.profile_pic
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROFILE_PIC)
    }
}

/// Public summary returned to anonymous viewers (no relationship flags).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUserSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatus {
    #[serde(default)]
    pub follows: bool,
    #[serde(default)]
    pub follows_back: bool,
}

impl FollowStatus {
    pub fn button_label(&self) -> &'static str {
        match (self.follows, self.follows_back) {
            (true, _) => "Following",
            (false, true) => "Follow Back",
            (false, false) => "Follow",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub follower_ids: Vec<u64>,
    #[serde(default)]
    pub following_ids: Vec<u64>,
    #[serde(default)]
    pub owned_post_ids: Vec<u64>,
    #[serde(default)]
    pub liked_post_ids: Vec<u64>,
    #[serde(default)]
    pub saved_post_ids: Vec<u64>,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// `POST /auth/login` response: user fields plus both tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub is_google: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_summary_tolerates_missing_fields() {
        let post: PostSummary = serde_json::from_str(
            r#"{"description":"hello","createdBy":"ana","likeIds":[3,4],"likeCount":2}"#,
        )
        .unwrap();
        assert_eq!(post.id, 0);
        assert_eq!(post.created_by, "ana");
        assert_eq!(post.like_ids, vec![3, 4]);
        assert!(post.saved_ids.is_empty());
    }

    #[test]
    fn user_summary_falls_back_to_default_picture() {
        let user: UserSummary =
            serde_json::from_str(r#"{"id":9,"name":"bo","profilePic":"","follows":true}"#)
                .unwrap();
        assert!(user.follows);
        assert!(!user.follows_back);
        assert_eq!(user.profile_pic(), DEFAULT_PROFILE_PIC);
    }

    #[test]
    fn follow_button_labels() {
        let status = |follows, follows_back| FollowStatus {
            follows,
            follows_back,
        };
        assert_eq!(status(true, true).button_label(), "Following");
        assert_eq!(status(false, true).button_label(), "Follow Back");
        assert_eq!(status(false, false).button_label(), "Follow");
    }

    #[test]
    fn refresh_request_is_camel_case() {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: "r1",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "refreshToken": "r1" }));
    }
}
