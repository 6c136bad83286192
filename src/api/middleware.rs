use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use super::SharedState;
use crate::errors::ApiError;
use crate::store::UserSnapshot;

pub const SERVICE_NAME_HEADER: &str = "x-service-name";
pub const REQUEST_AT_HEADER: &str = "x-request-at";
pub const API_KEY_HEADER: &str = "x-api-key";

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> &'h str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn ip_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(s) = forwarded.to_str() {
            // Take the first IP if multiple
            let ip = s.split(',').next().unwrap_or(s).trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(s) = real_ip.to_str() {
            let ip = s.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }
    None
}

fn client_ip_of(extensions: &axum::http::Extensions, headers: &HeaderMap) -> String {
    // Prefer the connect info inserted by axum, then proxy headers
    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    ip_from_headers(headers).unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Caller identity used for admission control and audit trails.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip_of(&parts.extensions, &parts.headers)))
    }
}

/// Pipeline stage 1: the service signature gate.
///
/// Runs before anything else so forged callers are turned away without
/// consuming rate-limit budget. Missing headers verify as empty strings and
/// fail like any other mismatch.
pub async fn verify_service_signature(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers();
    let service = header_str(headers, SERVICE_NAME_HEADER);
    let request_at = header_str(headers, REQUEST_AT_HEADER);
    let presented = header_str(headers, API_KEY_HEADER);

    if !state.signature.verify(service, request_at, presented) {
        let client = client_ip_of(request.extensions(), headers);
        state
            .audit
            .signature_invalid((!service.is_empty()).then_some(service), &client);
        return Err(ApiError::InvalidSignature);
    }
    Ok(next.run(request).await)
}

/// Pipeline stage 2: admission control, keyed by client IP.
pub async fn admission(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_ip_of(request.extensions(), request.headers());
    if !state.limiter.allow(&client) {
        state.audit.rate_limited(&client);
        return Err(ApiError::TooManyRequests);
    }
    Ok(next.run(request).await)
}

/// Pipeline stage 3: bearer-token identity, protected routes only.
///
/// On success the embedded snapshot is attached to the request so handlers
/// receive the current user through [`AuthUser`] instead of re-querying
/// storage.
pub async fn require_auth(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_ip_of(request.extensions(), request.headers());
    let header = header_str(request.headers(), AUTHORIZATION.as_str());

    let token = extract_bearer_token(header).ok_or_else(|| {
        state.audit.auth_failure(&client, "missing bearer token");
        ApiError::Unauthorized
    })?;
    let claims = state.tokens.validate(token).ok_or_else(|| {
        state.audit.auth_failure(&client, "token rejected");
        ApiError::Unauthorized
    })?;

    state.audit.auth_success(&claims.user.username, &client);
    request.extensions_mut().insert(claims.user);
    Ok(next.run(request).await)
}

/// Accepts only `Bearer <token>`: exactly two parts, case-insensitive
/// scheme, non-empty token.
fn extract_bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

/// The authenticated identity snapshot, attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserSnapshot);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserSnapshot>()
            .cloned()
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction_requires_all_three_conditions() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("BEARER abc"), Some("abc"));

        // wrong scheme
        assert_eq!(extract_bearer_token("Basic abc"), None);
        // one part
        assert_eq!(extract_bearer_token("Bearer"), None);
        // empty token collapses to one part
        assert_eq!(extract_bearer_token("Bearer "), None);
        // three parts
        assert_eq!(extract_bearer_token("Bearer abc def"), None);
        // empty header
        assert_eq!(extract_bearer_token(""), None);
    }

    #[test]
    fn forwarded_header_takes_first_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.1.2.3, 172.16.0.9".parse().unwrap());
        assert_eq!(ip_from_headers(&headers).as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn real_ip_header_is_a_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "192.168.7.1".parse().unwrap());
        assert_eq!(ip_from_headers(&headers).as_deref(), Some("192.168.7.1"));
    }
}
