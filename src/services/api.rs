//! Remote platform API — wire types, service traits and the `reqwest` transport.
//!
//! DESIGN
//! ======
//! The portal never stores business data; it forwards to the platform API.
//! `AuthApi` and `SettingsApi` are the seams: routes and services depend on
//! the traits, `HttpApi` implements them over HTTP, and tests substitute
//! in-memory mocks.
//!
//! ERROR HANDLING
//! ==============
//! A 401 maps to `ApiError::Unauthorized` so session hydration can tell an
//! invalid token apart from a transport failure.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ApiTimeouts;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request could not be sent or timed out.
    #[error("API request failed: {0}")]
    Request(String),

    /// The access token was rejected.
    #[error("API rejected credentials")]
    Unauthorized,

    /// Any other non-success status.
    #[error("API response error: status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Closed set of platform roles. Adding a role is a compile-time change at
/// every guard site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Moderator,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    /// Landing area for `/dashboard`.
    #[must_use]
    pub fn home_path(self) -> &'static str {
        match self {
            Self::Student => "/student",
            Self::Teacher => "/teacher",
            Self::Moderator | Self::Admin => "/admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Blocked,
}

/// Authenticated platform user as returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Teacher-only: subdomain / profile handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Teacher-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Query for the teacher listing. Serialized into the cache key, so field
/// order is part of the key format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

// =============================================================================
// SERVICE TRAITS
// =============================================================================

/// Authentication endpoints of the platform API.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    async fn request_otp(&self, phone: &str) -> Result<(), ApiError>;
    async fn login(&self, phone: &str, code: &str) -> Result<LoginResponse, ApiError>;
    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;
    async fn me(&self, access_token: &str) -> Result<User, ApiError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// Settings endpoints of the platform API. Payloads are opaque JSON.
#[async_trait::async_trait]
pub trait SettingsApi: Send + Sync {
    async fn platform_settings(&self, access_token: &str) -> Result<serde_json::Value, ApiError>;
    async fn update_platform_settings(
        &self,
        access_token: &str,
        patch: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError>;
    async fn teacher_settings(&self, access_token: &str, teacher_id: i64) -> Result<serde_json::Value, ApiError>;
    async fn update_teacher_settings(
        &self,
        access_token: &str,
        teacher_id: i64,
        patch: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError>;
    async fn list_teachers(
        &self,
        access_token: &str,
        params: &TeacherListParams,
    ) -> Result<serde_json::Value, ApiError>;
}

// =============================================================================
// HTTP TRANSPORT
// =============================================================================

pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeouts: ApiTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = req
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status: status.as_u16(), body });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let resp = self.send(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpApi {
    async fn request_otp(&self, phone: &str) -> Result<(), ApiError> {
        let req = self
            .http
            .post(self.url("/auth/otp/request"))
            .json(&serde_json::json!({ "phone": phone }));
        self.send(req).await.map(|_| ())
    }

    async fn login(&self, phone: &str, code: &str) -> Result<LoginResponse, ApiError> {
        let req = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "phone": phone, "code": code }));
        self.send_json(req).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        let req = self
            .http
            .post(self.url("/auth/logout"))
            .bearer_auth(access_token);
        self.send(req).await.map(|_| ())
    }

    async fn me(&self, access_token: &str) -> Result<User, ApiError> {
        let req = self.http.get(self.url("/auth/me")).bearer_auth(access_token);
        self.send_json(req).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let req = self
            .http
            .post(self.url("/auth/refresh"))
            .json(&serde_json::json!({ "refreshToken": refresh_token }));
        self.send_json(req).await
    }
}

#[async_trait::async_trait]
impl SettingsApi for HttpApi {
    async fn platform_settings(&self, access_token: &str) -> Result<serde_json::Value, ApiError> {
        let req = self
            .http
            .get(self.url("/settings/platform"))
            .bearer_auth(access_token);
        self.send_json(req).await
    }

    async fn update_platform_settings(
        &self,
        access_token: &str,
        patch: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let req = self
            .http
            .put(self.url("/settings/platform"))
            .bearer_auth(access_token)
            .json(patch);
        self.send_json(req).await
    }

    async fn teacher_settings(&self, access_token: &str, teacher_id: i64) -> Result<serde_json::Value, ApiError> {
        let req = self
            .http
            .get(self.url(&format!("/settings/teachers/{teacher_id}")))
            .bearer_auth(access_token);
        self.send_json(req).await
    }

    async fn update_teacher_settings(
        &self,
        access_token: &str,
        teacher_id: i64,
        patch: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let req = self
            .http
            .put(self.url(&format!("/settings/teachers/{teacher_id}")))
            .bearer_auth(access_token)
            .json(patch);
        self.send_json(req).await
    }

    async fn list_teachers(
        &self,
        access_token: &str,
        params: &TeacherListParams,
    ) -> Result<serde_json::Value, ApiError> {
        let req = self
            .http
            .get(self.url("/teachers"))
            .bearer_auth(access_token)
            .query(params);
        self.send_json(req).await
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
