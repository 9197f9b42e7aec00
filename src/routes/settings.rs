//! Settings routes — role-checked proxies over the cached settings service.

use std::future::Future;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;

use super::auth::{RequestSession, api_error_to_status, authorize, error_response};
use crate::services::api::{ApiError, Role, TeacherListParams, User};
use crate::services::guard::RoleGroup;
use crate::state::AppState;

/// Authorize, run `op` with the caller and their access token, and attach
/// the (possibly rotated) cookie jar to whatever comes back.
async fn guarded<F, Fut>(session: RequestSession, group: RoleGroup, op: F) -> Response
where
    F: FnOnce(User, String) -> Fut,
    Fut: Future<Output = Result<Value, ApiError>>,
{
    let authority = session.authority();
    let outcome = match authorize(&authority, group).await {
        Ok((user, token)) => op(user, token).await,
        Err(status) => return (authority.into_tokens().into_jar(), status).into_response(),
    };
    let jar = authority.into_tokens().into_jar();
    match outcome {
        Ok(body) => (jar, Json(body)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "settings request failed");
            (jar, error_response(api_error_to_status(&e), e)).into_response()
        }
    }
}

/// Admins reach every teacher's settings; a teacher only their own.
fn can_access_teacher(user: &User, teacher_id: i64) -> bool {
    user.role == Role::Admin || user.id == teacher_id
}

fn forbidden() -> Result<Value, ApiError> {
    Err(ApiError::Status { status: StatusCode::FORBIDDEN.as_u16(), body: "not your settings".into() })
}

/// `GET /api/settings/platform`
pub async fn get_platform(State(state): State<AppState>, session: RequestSession) -> Response {
    guarded(session, RoleGroup::AdminOnly, |_, token| async move {
        state.settings.platform_settings(&token).await
    })
    .await
}

/// `PUT /api/settings/platform`
pub async fn put_platform(
    State(state): State<AppState>,
    session: RequestSession,
    Json(patch): Json<Value>,
) -> Response {
    guarded(session, RoleGroup::AdminOnly, |_, token| async move {
        state.settings.update_platform_settings(&token, &patch).await
    })
    .await
}

/// `GET /api/settings/teachers/{id}`
pub async fn get_teacher(
    State(state): State<AppState>,
    Path(teacher_id): Path<i64>,
    session: RequestSession,
) -> Response {
    guarded(session, RoleGroup::TeacherOrAbove, |user, token| async move {
        if !can_access_teacher(&user, teacher_id) {
            return forbidden();
        }
        state.settings.teacher_settings(&token, teacher_id).await
    })
    .await
}

/// `PUT /api/settings/teachers/{id}`
pub async fn put_teacher(
    State(state): State<AppState>,
    Path(teacher_id): Path<i64>,
    session: RequestSession,
    Json(patch): Json<Value>,
) -> Response {
    guarded(session, RoleGroup::TeacherOrAbove, |user, token| async move {
        if !can_access_teacher(&user, teacher_id) {
            return forbidden();
        }
        state
            .settings
            .update_teacher_settings(&token, teacher_id, &patch)
            .await
    })
    .await
}

/// `GET /api/teachers`
pub async fn list_teachers(
    State(state): State<AppState>,
    Query(params): Query<TeacherListParams>,
    session: RequestSession,
) -> Response {
    guarded(session, RoleGroup::ModeratorOrAbove, |_, token| async move {
        state.settings.list_teachers(&token, &params).await
    })
    .await
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
