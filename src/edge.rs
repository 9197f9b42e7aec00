//! Edge middleware — classifies the first path segment before page routing.
//!
//! SYSTEM CONTEXT
//! ==============
//! Teacher profiles live at `/{username}`, which collides with every
//! top-level application route. This layer decides whether a path is
//! definitely an application route or possibly a username, records the
//! answer as a request extension, and passes the request through untouched.
//! The final routing decision belongs to the page handlers.
//!
//! ORDERING
//! ========
//! Static assets and the API prefix are bypassed before the reserved-path
//! check so system paths are never misread as usernames. Any future rewrite
//! to tenant-specific rendering must keep that order.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

pub const FRAMEWORK_PREFIX: &str = "/_next";
pub const API_PREFIX: &str = "/api";

/// Top-level segments owned by the application. New top-level routes must be
/// added here or they will be classified as username candidates.
pub const RESERVED_PATHS: &[&str] = &[
    // auth
    "login",
    "register",
    "password",
    "forgot-password",
    "reset-password",
    // public
    "blog",
    "pricing",
    "about",
    "contact",
    // dashboards
    "dashboard",
    "student",
    "teacher",
    "admin",
    "onboarding",
    // system
    "api",
    "_next",
    "favicon",
    "sitemap",
    "robots",
    // static asset directories
    "images",
    "fonts",
    "icons",
];

/// Outcome of classifying a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathClass {
    /// Framework-internal, API or static asset path; never routed as a page.
    Bypass,
    /// Site root or a reserved top-level application route.
    Application,
    /// First segment may be a teacher username (lowercased).
    UsernameCandidate(String),
}

impl PathClass {
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UsernameCandidate(name) => Some(name),
            Self::Bypass | Self::Application => None,
        }
    }
}

/// Paths the edge layer runs on at all. Mirrors the deployment matcher:
/// static/image bundles, the favicon and anything with a dot are excluded.
#[must_use]
pub fn matcher_applies(path: &str) -> bool {
    !(path.starts_with("/_next/static")
        || path.starts_with("/_next/image")
        || path.starts_with("/favicon.ico")
        || path.contains('.'))
}

#[must_use]
pub fn is_reserved_path(segment: &str) -> bool {
    RESERVED_PATHS.contains(&segment)
}

/// Classify `path`.
#[must_use]
pub fn classify_path(path: &str) -> PathClass {
    if path.starts_with(FRAMEWORK_PREFIX) || path.starts_with(API_PREFIX) || path.contains('.') {
        return PathClass::Bypass;
    }

    let Some(first) = path.split('/').find(|s| !s.is_empty()) else {
        return PathClass::Application;
    };
    let first = first.to_ascii_lowercase();
    if is_reserved_path(&first) {
        return PathClass::Application;
    }
    PathClass::UsernameCandidate(first)
}

/// Axum middleware: record the [`PathClass`] and pass through unmodified.
pub async fn classify_request(mut req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if !matcher_applies(path) {
        return next.run(req).await;
    }

    let class = classify_path(path);
    if let PathClass::UsernameCandidate(name) = &class {
        tracing::debug!(path, username = %name, "path classified as username candidate");
    }
    req.extensions_mut().insert(class);
    next.run(req).await
}

#[cfg(test)]
#[path = "edge_test.rs"]
mod tests;
