use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use lucky_common::Caller;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_UID_HEADER: &str = "x-user-uid";
pub const DEV_EMAIL_HEADER: &str = "x-dev-user-email";

/// The caller behind a request, resolved from the identity headers.
///
/// A uid with no stored profile is still accepted, so that first-time users
/// can register. Admin rights come from the profile flag or from
/// `ADMIN_EMAILS`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser(pub Caller);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = if let Some(uid) = header(parts, USER_UID_HEADER) {
            match state.store.get_user(uid)? {
                Some(user) => user,
                None => return Ok(AuthUser(Caller::user(uid))),
            }
        } else if let Some(email) = header(parts, DEV_EMAIL_HEADER).filter(|_| state.auth.dev_mode)
        {
            state
                .store
                .find_user_by_email(email)?
                .ok_or_else(|| ApiError::Unauthenticated {
                    reason: format!("no user registered with email {email}"),
                })?
        } else {
            return Err(ApiError::Unauthenticated {
                reason: format!("missing {USER_UID_HEADER} header"),
            });
        };

        let is_admin = user.is_admin || state.auth.is_admin_email(&user.email);
        Ok(AuthUser(Caller {
            uid: user.uid,
            email: Some(user.email),
            is_admin,
        }))
    }
}
