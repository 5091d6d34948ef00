//! Request descriptors, identities, and pipeline outcomes.

use axum::http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode};
use thiserror::Error;
use uuid::Uuid;

use super::audit::AuditContext;
use super::policy::Role;

/// Endpoint classes drive per-class rate-limit quotas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Auth,
    Admin,
    General,
}

impl EndpointClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Admin => "admin",
            Self::General => "general",
        }
    }
}

/// Everything the pipeline needs to know about one incoming request.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub client_addr: String,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

impl RequestDescriptor {
    /// Build a descriptor from raw request parts.
    #[must_use]
    pub fn from_parts(method: Method, path: &str, headers: &HeaderMap, peer: Option<&str>) -> Self {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let user_agent = headers
            .get("user-agent")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let request_id = headers
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            method,
            path: path.to_string(),
            bearer,
            client_addr: client_address(headers, peer),
            user_agent,
            request_id,
        }
    }

    /// Request-scoped fields copied onto every audit record.
    #[must_use]
    pub fn audit_context(&self) -> AuditContext {
        AuditContext {
            client_addr: Some(self.client_addr.clone()),
            user_agent: self.user_agent.clone(),
            request_id: self.request_id.clone(),
            method: Some(self.method.to_string()),
            path: Some(self.path.clone()),
        }
    }
}

/// Resolve the client address used as the rate-limit actor key.
///
/// Proxy headers win over the peer address but are only as trustworthy as the
/// proxy in front; placeholder `unknown` entries are skipped.
#[must_use]
pub fn client_address(headers: &HeaderMap, peer: Option<&str>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("unknown"));
    if let Some(addr) = forwarded {
        return addr.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("unknown"));
    if let Some(addr) = real_ip {
        return addr.to_string();
    }

    peer.map_or_else(|| "unknown".to_string(), str::to_string)
}

/// Identity attached to a request after full validation.
#[derive(Clone, Debug)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    pub user_id: Uuid,
    pub roles: Vec<Role>,
    pub must_rotate: bool,
}

impl AuthenticatedIdentity {
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Why a request or a credential operation was refused.
///
/// Display strings are client-safe: no subjects, no secrets, no internals.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("authentication required")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid credentials")]
    BadCredentials,
    #[error("account disabled or unknown")]
    AccountDisabled,
    #[error("account locked")]
    AccountLocked,
    #[error("password change required")]
    RotationRequired,
    #[error("current password mismatch")]
    CredentialMismatch,
    #[error("insufficient privileges")]
    InsufficientRole,
    #[error("rate limit exceeded")]
    RateLimited {
        retry_after_seconds: u64,
        limit_per_minute: u32,
    },
    #[error("malformed request")]
    Malformed,
    #[error("internal error")]
    Internal,
}

impl Rejection {
    /// HTTP status the rejection maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken | Self::BadCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Self::AccountDisabled
            | Self::AccountLocked
            | Self::RotationRequired
            | Self::CredentialMismatch
            | Self::InsufficientRole => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Malformed => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Pipeline outcome for one request. Public routes may carry no identity.
#[derive(Clone, Debug)]
pub enum Decision {
    Allowed(Option<AuthenticatedIdentity>),
    Rejected(Rejection),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_address_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_address(&headers, Some("10.0.0.1")), "1.2.3.4");
    }

    #[test]
    fn client_address_skips_unknown_placeholder() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("Unknown"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_address(&headers, Some("10.0.0.1")), "9.9.9.9");
    }

    #[test]
    fn client_address_falls_back_to_peer() {
        let headers = HeaderMap::new();
        assert_eq!(client_address(&headers, Some("10.0.0.1")), "10.0.0.1");
    }

    #[test]
    fn client_address_unknown_when_nothing_available() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("unknown"));
        assert_eq!(client_address(&headers, None), "unknown");
    }

    #[test]
    fn descriptor_extracts_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        let descriptor =
            RequestDescriptor::from_parts(Method::GET, "/auth/whoami", &headers, None);
        assert_eq!(descriptor.bearer.as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn descriptor_ignores_non_bearer_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        let descriptor = RequestDescriptor::from_parts(Method::GET, "/", &headers, None);
        assert_eq!(descriptor.bearer, None);
    }

    #[test]
    fn descriptor_ignores_empty_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        let descriptor = RequestDescriptor::from_parts(Method::GET, "/", &headers, None);
        assert_eq!(descriptor.bearer, None);
    }

    #[test]
    fn rejection_status_mapping() {
        assert_eq!(Rejection::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Rejection::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Rejection::BadCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Rejection::AccountDisabled.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::AccountLocked.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::RotationRequired.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::InsufficientRole.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            Rejection::RateLimited {
                retry_after_seconds: 12,
                limit_per_minute: 5
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(Rejection::Malformed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Rejection::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rejection_messages_stay_generic() {
        for rejection in [
            Rejection::MissingToken,
            Rejection::InvalidToken,
            Rejection::BadCredentials,
            Rejection::AccountDisabled,
            Rejection::AccountLocked,
            Rejection::Internal,
        ] {
            let message = rejection.to_string();
            assert!(!message.contains("secret"));
            assert!(!message.contains("Bearer"));
        }
    }
}
