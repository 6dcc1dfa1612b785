use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth;
use crate::error::{AppError, AppResult};
use crate::models::Role;
use crate::state::AppState;

/// Capability check applied per route group: authenticate the cookie/bearer
/// token, require one of the allowed roles, and hand the caller to the
/// handler via request extensions.
#[derive(Clone)]
pub struct RoleGate {
    state: AppState,
    allowed: &'static [Role],
}

impl RoleGate {
    pub fn new(state: &AppState, allowed: &'static [Role]) -> Self {
        Self {
            state: state.clone(),
            allowed,
        }
    }
}

pub async fn authorize(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let user = auth::authenticate(&gate.state.config, req.headers())?;

    if !gate.allowed.contains(&user.role) {
        return Err(AppError::Forbidden(format!(
            "Forbidden: role '{}' is not allowed for this action.",
            user.role.as_str()
        )));
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
