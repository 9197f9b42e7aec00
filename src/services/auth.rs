//! Auth client — OTP login, logout, profile fetch and token rotation.
//!
//! The client keeps no state of its own: phone numbers are normalized on the
//! way in, tokens live in whatever [`TokenStore`] the caller passes.

use std::sync::Arc;

use super::api::{ApiError, AuthApi, LoginResponse, TokenPair, User};
use super::phone;
use super::tokens::TokenStore;

pub const OTP_CODE_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("phone number must have {} digits", phone::NATIONAL_DIGITS)]
    InvalidPhone,
    #[error("verification code must be {OTP_CODE_LEN} digits")]
    InvalidCode,
    #[error("no refresh token available")]
    MissingRefreshToken,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("user role changed; sign in again")]
    RoleChanged,
    #[error("session changed while the request was in flight")]
    Superseded,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Clone)]
pub struct AuthClient {
    api: Arc<dyn AuthApi>,
}

impl AuthClient {
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self { api }
    }

    /// Ask the API to text a one-time code to `raw_phone`.
    ///
    /// # Errors
    ///
    /// `InvalidPhone` for incomplete numbers; API failures propagate.
    pub async fn request_otp(&self, raw_phone: &str) -> Result<(), AuthError> {
        let phone = e164(raw_phone)?;
        self.api.request_otp(&phone).await?;
        tracing::info!(phone = %phone::format_phone_number(raw_phone), "otp requested");
        Ok(())
    }

    /// Exchange phone + code for a user and token pair.
    ///
    /// # Errors
    ///
    /// Validation and API failures propagate; nothing is swallowed.
    pub async fn login(&self, raw_phone: &str, code: &str) -> Result<LoginResponse, AuthError> {
        let phone = e164(raw_phone)?;
        let code = code.trim();
        if code.len() != OTP_CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AuthError::InvalidCode);
        }
        Ok(self.api.login(&phone, code).await?)
    }

    /// Invalidate the session server-side.
    ///
    /// # Errors
    ///
    /// API failures propagate; callers treat this call as best effort.
    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        Ok(self.api.logout(access_token).await?)
    }

    /// Fetch the user behind `access_token`.
    ///
    /// # Errors
    ///
    /// API failures propagate (`ApiError::Unauthorized` for rejected tokens).
    pub async fn me(&self, access_token: &str) -> Result<User, AuthError> {
        Ok(self.api.me(access_token).await?)
    }

    /// Rotate the token pair using the stored refresh token. The store is
    /// only written on success.
    ///
    /// # Errors
    ///
    /// `MissingRefreshToken` when the store has none; API failures propagate.
    pub async fn refresh_tokens(&self, tokens: &mut dyn TokenStore) -> Result<TokenPair, AuthError> {
        let refresh = tokens
            .refresh_token()
            .ok_or(AuthError::MissingRefreshToken)?;
        let pair = self.refresh_with(&refresh).await?;
        tokens.set_tokens(&pair.access_token, &pair.refresh_token);
        Ok(pair)
    }

    /// Rotate using an explicit refresh token, leaving storage to the caller.
    ///
    /// # Errors
    ///
    /// API failures propagate.
    pub async fn refresh_with(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let pair = self.api.refresh_token(refresh_token).await?;
        tracing::debug!("token pair rotated");
        Ok(pair)
    }
}

fn e164(raw_phone: &str) -> Result<String, AuthError> {
    if !phone::is_complete_phone(raw_phone) {
        return Err(AuthError::InvalidPhone);
    }
    Ok(phone::format_full_phone_number(raw_phone))
}


#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
