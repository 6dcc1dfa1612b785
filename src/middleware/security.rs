use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Reject requests whose Host header is not in the configured allow-list.
pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    let trusted = &state.config.trusted_hosts;
    if trusted.iter().any(|host| host.trim() == "*") {
        return Ok(next.run(req).await);
    }

    let host = req
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(strip_port)
        .unwrap_or_default();

    if host.is_empty() || !trusted.iter().any(|candidate| candidate == host) {
        return Err(AppError::BadRequest("Untrusted host header.".to_string()));
    }

    Ok(next.run(req).await)
}

fn strip_port(host: &str) -> &str {
    host.rsplit_once(':')
        .map(|(name, port)| {
            if port.chars().all(|c| c.is_ascii_digit()) {
                name
            } else {
                host
            }
        })
        .unwrap_or(host)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::strip_port;

    #[test]
    fn strips_port_suffix() {
        assert_eq!(strip_port("localhost:8000"), "localhost");
        assert_eq!(strip_port("api.example.com"), "api.example.com");
        assert_eq!(strip_port("127.0.0.1:80"), "127.0.0.1");
    }
}
