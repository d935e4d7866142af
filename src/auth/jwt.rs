//! Minimal JWT payload inspection.
//!
//! Signatures are not verified; the server does that. The client only reads
//! claims it needs for display and identity.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

/// Decode the payload segment of a JWT into its claims object.
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    segments.next()?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// Numeric user id carried by the token (`userId`, `user_id`, `id` or `sub`).
pub fn user_id(token: &str) -> Option<u64> {
    let claims = decode_claims(token)?;
    ["userId", "user_id", "id", "sub"]
        .iter()
        .filter_map(|key| claims.get(*key))
        .find_map(as_u64)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Build an unsigned token with the given claims.
#[cfg(test)]
pub(crate) fn fake_token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_numeric_user_id_claim() {
        let token = fake_token(json!({ "userId": 42, "exp": 1_700_000_000 }));
        assert_eq!(user_id(&token), Some(42));
    }

    #[test]
    fn falls_back_to_string_subject() {
        let token = fake_token(json!({ "sub": "17" }));
        assert_eq!(user_id(&token), Some(17));
    }

    #[test]
    fn non_numeric_subject_is_ignored() {
        let token = fake_token(json!({ "sub": "ana@fixit.test" }));
        assert_eq!(user_id(&token), None);
    }

    #[test]
    fn garbage_tokens_decode_to_nothing() {
        assert!(decode_claims("").is_none());
        assert!(decode_claims("only.two").is_none());
        assert!(decode_claims("a.!!!.c").is_none());
        assert!(user_id("opaque-token").is_none());
    }
}
