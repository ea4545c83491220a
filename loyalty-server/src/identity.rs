//! Caller identity, taken from headers set by the upstream gateway.
//!
//! Authentication happens before requests reach this service; these
//! extractors only read what the gateway forwarded.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::server::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ORG_HEADER: &str = "x-user-org-id";
pub const PARTNER_ID_HEADER: &str = "x-partner-id";

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// An end user acting on their own points and redemptions.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: String,
    pub org_id: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for UserIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id =
            header_value(parts, USER_ID_HEADER).ok_or(ApiError::MissingIdentity(USER_ID_HEADER))?;
        Ok(Self {
            user_id,
            org_id: header_value(parts, USER_ORG_HEADER),
        })
    }
}

/// A partner terminal scanning and confirming redemptions.
#[derive(Debug, Clone)]
pub struct PartnerIdentity {
    pub partner_id: String,
}

impl<S: Send + Sync> FromRequestParts<S> for PartnerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let partner_id = header_value(parts, PARTNER_ID_HEADER)
            .ok_or(ApiError::MissingIdentity(PARTNER_ID_HEADER))?;
        Ok(Self { partner_id })
    }
}
