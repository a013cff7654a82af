//! Backend endpoint paths and request/response wire types.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use fncr_core::UserProfile;

// ============================================================================
// Endpoint Paths
// ============================================================================

/// POST: send a one-time passcode to an email or phone.
pub const REQUEST_OTP: &str = "api/users/request-otp/";

/// POST: exchange a passcode for a token pair and user projection.
pub const VERIFY_OTP: &str = "api/users/verify-otp/";

/// POST: exchange a refresh token for a rotated token pair.
pub const TOKEN_REFRESH: &str = "api/auth/token/refresh/";

/// GET: the current user projection.
pub const CURRENT_USER: &str = "api/users/me/";

/// PATCH target for a user resource.
pub fn user_path(id: i64) -> String {
    format!("api/users/{id}/")
}

/// POST: start SMB onboarding from a website address.
pub const SMB_INITIATE: &str = "core/smbs/initiate-onboarding/";

/// PATCH target for an SMB resource.
pub fn smb_path(id: i64) -> String {
    format!("core/smbs/{id}/")
}

/// POST: start lender onboarding from a website address.
pub const LENDER_INITIATE: &str = "core/lender/initiate-onboarding/";

/// PATCH target for a lender resource.
pub fn lender_path(id: i64) -> String {
    format!("core/lenders/{id}/")
}

/// GET target for the algorithmic lender matches of an SMB.
pub fn algorithmic_match_path(smb_id: &str) -> String {
    format!("core/matches/algorithmic-match/{smb_id}/")
}

/// GET: the caller's in-progress deal abstract.
pub const CURRENT_DEAL_ABSTRACT: &str = "core/deal-abstracts/current/";

/// POST: feed a chat turn (multipart) into deal-abstract processing.
pub const PROCESS_DEAL_CHAT: &str = "core/deal-abstracts/process/";

/// POST: bulk document upload (multipart).
pub const BULK_UPLOAD_DOCUMENTS: &str = "core/documents/bulk-upload/";

/// GET target for a chat session.
pub fn chat_session_path(session_id: &str) -> String {
    format!("core/chat-sessions/{session_id}/")
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for requesting an OTP.
#[derive(Debug, Serialize)]
pub struct RequestOtpBody<'a> {
    pub email: &'a str,
    pub otp_type: &'a str,
}

/// Request body for verifying an OTP.
#[derive(Debug, Serialize)]
pub struct VerifyOtpBody<'a> {
    pub email: &'a str,
    pub otp_code: &'a str,
}

/// Response from OTP verification: freshly issued credentials plus the
/// user projection.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserProfile,
}

/// Request body for token refresh.
#[derive(Debug, Serialize)]
pub struct RefreshBody<'a> {
    pub refresh: &'a str,
}

/// Response from token refresh. The backend may rotate both tokens.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    pub refresh: String,
}
