//! Role-gated route guards.
//!
//! SYSTEM CONTEXT
//! ==============
//! Layouts for each dashboard area evaluate a guard against the current
//! session. A guard never redirects while the session is still loading: a
//! redirect during hydration would bounce a user whose session is about to
//! be restored.

use super::api::{Role, User};
use super::session::SessionStatus;
use crate::config::{DEFAULT_FALLBACK_PATH, DEFAULT_LOGIN_PATH};

/// Allowed-role sets used by guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGroup {
    /// Any signed-in user.
    Any,
    Only(Role),
    /// {admin}
    AdminOnly,
    /// {admin, moderator}
    ModeratorOrAbove,
    /// {admin, teacher}
    TeacherOrAbove,
}

impl RoleGroup {
    #[must_use]
    pub fn contains(self, role: Role) -> bool {
        match self {
            Self::Any => true,
            Self::Only(only) => only == role,
            Self::AdminOnly => matches!(role, Role::Admin),
            Self::ModeratorOrAbove => match role {
                Role::Admin | Role::Moderator => true,
                Role::Teacher | Role::Student => false,
            },
            Self::TeacherOrAbove => match role {
                Role::Admin | Role::Teacher => true,
                Role::Moderator | Role::Student => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still hydrating: show a neutral loading state, do nothing.
    Loading,
    /// Access granted.
    Render,
    /// Navigate away. Issued at most once per guard.
    Redirect(String),
    /// Access denied and the redirect has already been issued.
    Hold,
}

/// Per-mount guard state.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    require_auth: bool,
    roles: Option<RoleGroup>,
    login_path: String,
    fallback_path: String,
    redirected: bool,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            require_auth: true,
            roles: None,
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            fallback_path: DEFAULT_FALLBACK_PATH.to_owned(),
            redirected: false,
        }
    }
}

impl RouteGuard {
    /// Guard that only requires a signed-in user.
    #[must_use]
    pub fn authenticated() -> Self {
        Self::roles(RoleGroup::Any)
    }

    /// Guard that requires a role in `group`.
    #[must_use]
    pub fn roles(group: RoleGroup) -> Self {
        Self { roles: Some(group), ..Self::default() }
    }

    #[must_use]
    pub fn admin_only() -> Self {
        Self::roles(RoleGroup::AdminOnly)
    }

    #[must_use]
    pub fn moderator_or_above() -> Self {
        Self::roles(RoleGroup::ModeratorOrAbove)
    }

    #[must_use]
    pub fn teacher_or_above() -> Self {
        Self::roles(RoleGroup::TeacherOrAbove)
    }

    /// Guard that never requires a session (public pages).
    #[cfg(test)]
    #[must_use]
    pub fn public() -> Self {
        Self { require_auth: false, ..Self::default() }
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_fallback_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_path = path.into();
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn has_redirected(&self) -> bool {
        self.redirected
    }

    /// Decide what the guarded view should do for this render.
    pub fn evaluate(&mut self, status: SessionStatus, user: Option<&User>) -> GuardDecision {
        let target = match (status, user) {
            (SessionStatus::Loading, _) => return GuardDecision::Loading,
            (SessionStatus::Authenticated, Some(user)) => match self.roles {
                Some(group) if !group.contains(user.role) => Some(self.fallback_path.clone()),
                _ => None,
            },
            (SessionStatus::Authenticated, None) | (SessionStatus::Unauthenticated, _) => {
                self.require_auth.then(|| self.login_path.clone())
            }
        };

        match target {
            None => GuardDecision::Render,
            Some(_) if self.redirected => GuardDecision::Hold,
            Some(path) => {
                self.redirected = true;
                GuardDecision::Redirect(path)
            }
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
