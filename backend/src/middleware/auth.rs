use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    state::AppState,
    utils::security::{fingerprint, tokens_match},
};

/// Identity of an authenticated operator, attached to admin requests.
#[derive(Debug, Clone)]
pub struct AdminActor {
    /// Fingerprint of the presented token; the token itself is never stored.
    pub token_fingerprint: String,
}

// Require the configured admin bearer token. An empty token locks the routes.
pub async fn auth_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.config.admin_api_token.as_str();
    if expected.is_empty() {
        return Err(AppError::Forbidden(
            "Admin API is disabled on this server".into(),
        ));
    }

    let token = extract_bearer(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;
    if !tokens_match(token, expected) {
        tracing::warn!(token = %fingerprint(token), "Rejected admin token");
        return Err(AppError::Unauthorized("Invalid bearer token".into()));
    }

    let actor = AdminActor {
        token_fingerprint: fingerprint(token),
    };
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .filter(|token| !token.is_empty())
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    if let Some(rest) = header.strip_prefix("Bearer ") {
        return Some(rest.trim());
    }
    if let Some(space_idx) = header.find(' ') {
        let (scheme, rest) = header.split_at(space_idx);
        if scheme.eq_ignore_ascii_case("bearer") {
            return Some(rest.trim());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bearer_token_accepts_any_scheme_case() {
        assert_eq!(parse_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(parse_bearer_token("BEARER abc"), Some("abc"));
        assert_eq!(parse_bearer_token("Basic abc"), None);
        assert_eq!(parse_bearer_token("abc"), None);
    }

    #[test]
    fn extract_bearer_ignores_empty_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer ".parse().expect("header"));
        assert!(extract_bearer(&headers).is_none());
        headers.insert(header::AUTHORIZATION, "Bearer t0k".parse().expect("header"));
        assert_eq!(extract_bearer(&headers), Some("t0k"));
    }
}
