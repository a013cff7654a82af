//! Backend user projection.

use serde::{Deserialize, Serialize};

/// The backend's projection of the current user.
///
/// Only the fields this client interprets are typed; everything else
/// the backend sends is preserved verbatim in `extra` so that writes
/// and re-serialization never drop data.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub is_phone_verified: bool,
    #[serde(default)]
    pub is_onboarding_complete: bool,
    #[serde(default)]
    pub onboarding_status: String,
    #[serde(default)]
    pub is_additional_info_required: bool,
    #[serde(default)]
    pub smb: Option<i64>,
    #[serde(default)]
    pub lender: Option<i64>,
    #[serde(default)]
    pub referrer: Option<i64>,
    #[serde(default)]
    pub session_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_unknown_fields() {
        let json = serde_json::json!({
            "id": 7,
            "email": "smb@example.com",
            "name": "Acme",
            "user_type": "SMB",
            "onboarding_status": "IN_PROGRESS",
            "session_id": "abc-123",
            "custom_backend_field": {"nested": true}
        });

        let user: UserProfile = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.user_type, "SMB");
        assert!(user.extra.contains_key("custom_backend_field"));

        let round = serde_json::to_value(&user).unwrap();
        assert_eq!(round["custom_backend_field"], json["custom_backend_field"]);

        // Round-tripping yields an equal profile; equality spans the
        // typed fields and the catch-all map.
        let reparsed: UserProfile = serde_json::from_value(round).unwrap();
        assert_eq!(user, reparsed);
    }
}
