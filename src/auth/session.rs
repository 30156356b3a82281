//! Session resolution
//!
//! Turns the raw session token carried by a request into an [`Identity`].
//! The token itself is checked by a [`SessionVerifier`]; this module only
//! decides what a verifier outcome means for the request.

use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::HeaderMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::types::{GateError, Result};

/// The authenticated caller, rebuilt from a verified token on every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable opaque user id
    pub uid: String,
    /// Informational only; never used for gating
    pub email_verified: bool,
}

/// Output of a successful verification
#[derive(Debug, Clone)]
pub struct VerifiedSession {
    pub uid: String,
    pub email_verified: bool,
    /// Custom claims carried by the token
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// Why a verifier rejected a token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// Malformed, badly signed, expired or revoked
    #[error("{0}")]
    Invalid(String),
    /// The verifier could not reach something it depends on
    #[error("{0}")]
    Unavailable(String),
}

/// External identity verification service
#[async_trait::async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Verify a session token. `check_revocation` asks the verifier to also
    /// reject sessions that were revoked after issue.
    async fn verify(
        &self,
        token: &str,
        check_revocation: bool,
    ) -> std::result::Result<VerifiedSession, VerifyError>;
}

/// Resolves request tokens into identities
#[derive(Clone)]
pub struct SessionResolver {
    verifier: Arc<dyn SessionVerifier>,
}

impl SessionResolver {
    pub fn new(verifier: Arc<dyn SessionVerifier>) -> Self {
        Self { verifier }
    }

    /// Resolve a raw token into an identity.
    ///
    /// An absent or blank token fails without calling the verifier. Exactly
    /// one verification is attempted otherwise, always with revocation
    /// checking; there are no retries.
    pub async fn resolve(&self, raw_token: Option<&str>) -> Result<Identity> {
        let token = match raw_token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(GateError::Unauthenticated("No session token".into())),
        };

        match self.verifier.verify(token, true).await {
            Ok(session) => {
                debug!(uid = %session.uid, "Session verified");
                Ok(Identity {
                    uid: session.uid,
                    email_verified: session.email_verified,
                })
            }
            Err(VerifyError::Invalid(reason)) => Err(GateError::Unauthenticated(reason)),
            Err(VerifyError::Unavailable(reason)) => Err(GateError::UpstreamUnavailable(
                format!("Identity verifier: {}", reason),
            )),
        }
    }
}

/// Extract the session token from a request.
///
/// The named cookie wins; an `Authorization: Bearer` header is accepted as a
/// fallback for non-browser clients.
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    extract_token_from_cookies(headers, cookie_name).or_else(|| {
        let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        extract_token_from_header(auth).map(str::to_string)
    })
}

/// Find a cookie by name across all `Cookie` headers, percent-decoded.
pub fn extract_token_from_cookies(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == cookie_name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
        .map(|value| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}

/// Extract token from an `Authorization: Bearer <token>` header.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Verifier that accepts one fixed token and counts calls
    struct FixedVerifier {
        calls: AtomicUsize,
        outcome: std::result::Result<VerifiedSession, VerifyError>,
    }

    impl FixedVerifier {
        fn new(outcome: std::result::Result<VerifiedSession, VerifyError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome,
            })
        }
    }

    #[async_trait::async_trait]
    impl SessionVerifier for FixedVerifier {
        async fn verify(
            &self,
            _token: &str,
            check_revocation: bool,
        ) -> std::result::Result<VerifiedSession, VerifyError> {
            assert!(check_revocation, "revocation must always be checked");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn session(uid: &str) -> VerifiedSession {
        VerifiedSession {
            uid: uid.into(),
            email_verified: true,
            claims: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_absent_token_skips_verifier() {
        let verifier = FixedVerifier::new(Ok(session("u1")));
        let resolver = SessionResolver::new(verifier.clone());

        for raw in [None, Some(""), Some("   ")] {
            let err = resolver.resolve(raw).await.unwrap_err();
            assert!(matches!(err, GateError::Unauthenticated(_)));
        }
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_token_resolves_identity() {
        let verifier = FixedVerifier::new(Ok(session("u1")));
        let resolver = SessionResolver::new(verifier.clone());

        let identity = resolver.resolve(Some("tok")).await.unwrap();
        assert_eq!(identity.uid, "u1");
        assert!(identity.email_verified);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthenticated() {
        let verifier = FixedVerifier::new(Err(VerifyError::Invalid("Token expired".into())));
        let resolver = SessionResolver::new(verifier.clone());

        let err = resolver.resolve(Some("tok")).await.unwrap_err();
        assert!(matches!(err, GateError::Unauthenticated(ref m) if m == "Token expired"));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verifier_outage_is_upstream_unavailable() {
        let verifier = FixedVerifier::new(Err(VerifyError::Unavailable("timeout".into())));
        let resolver = SessionResolver::new(verifier.clone());

        let err = resolver.resolve(Some("tok")).await.unwrap_err();
        assert!(matches!(err, GateError::UpstreamUnavailable(_)));
        // no retry
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extract_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; __session=abc%2E123; other=1"),
        );
        assert_eq!(
            extract_session_token(&headers, "__session"),
            Some("abc.123".to_string())
        );
        assert_eq!(extract_session_token(&headers, "missing"), None);
    }

    #[test]
    fn test_extract_from_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("__session=\"xyz\""));
        assert_eq!(
            extract_session_token(&headers, "__session"),
            Some("xyz".to_string())
        );
    }

    #[test]
    fn test_cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("__session=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(
            extract_session_token(&headers, "__session"),
            Some("from-cookie".to_string())
        );

        headers.remove(COOKIE);
        assert_eq!(
            extract_session_token(&headers, "__session"),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }

    #[test]
    fn test_empty_cookie_value_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("__session="));
        assert_eq!(extract_session_token(&headers, "__session"), None);
    }
}
