//! Session tokens
//!
//! Sessions are HS256 JWTs whose subject is the user's uid. Revocation is
//! checked against a per-user cut-off (`tokensValidAfter`): any session
//! issued before it is rejected.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::auth::session::{SessionVerifier, VerifiedSession, VerifyError};
use crate::types::{GateError, Result};

/// Minimum accepted secret length outside dev mode
pub const MIN_SECRET_LEN: usize = 32;

const DEV_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Payload stored in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    #[serde(default)]
    pub email_verified: bool,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Custom claims
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// Source of per-user revocation cut-offs
#[async_trait::async_trait]
pub trait RevocationSource: Send + Sync {
    /// Sessions issued before the returned instant are revoked
    async fn tokens_valid_after(&self, uid: &str) -> Result<Option<DateTime<Utc>>>;
}

/// JWT session verifier and issuer
#[derive(Clone)]
pub struct JwtSessionVerifier {
    secret: String,
    expiry_seconds: u64,
    validation: Validation,
    revocations: Option<Arc<dyn RevocationSource>>,
}

impl JwtSessionVerifier {
    /// Create a verifier
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(GateError::Config(
                "SESSION_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(GateError::Config(format!(
                "SESSION_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self::build(secret, expiry_seconds))
    }

    /// Create a verifier for dev mode (fixed, insecure secret)
    pub fn new_dev() -> Self {
        Self::build(DEV_SECRET.into(), 3600)
    }

    fn build(secret: String, expiry_seconds: u64) -> Self {
        let mut validation = Validation::default();
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            secret,
            expiry_seconds,
            validation,
            revocations: None,
        }
    }

    /// Attach a revocation source consulted when revocation is requested
    pub fn with_revocations(mut self, source: Arc<dyn RevocationSource>) -> Self {
        self.revocations = Some(source);
        self
    }

    /// Mint a session token for a uid
    pub fn issue(&self, uid: &str, email_verified: bool) -> Result<String> {
        let now = unix_now()?;
        self.encode_claims(&SessionClaims {
            sub: uid.to_string(),
            email_verified,
            iat: now,
            exp: now + self.expiry_seconds,
            claims: Default::default(),
        })
    }

    /// Encode arbitrary claims with this verifier's secret
    pub fn encode_claims(&self, claims: &SessionClaims) -> Result<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| GateError::Internal(format!("Failed to issue session: {}", e)))
    }

    fn decode_claims(&self, token: &str) -> std::result::Result<SessionClaims, VerifyError> {
        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &self.validation,
        )
        .map(|data| data.claims)
        .map_err(|err| {
            let reason = match err.kind() {
                ErrorKind::ExpiredSignature => "Session expired",
                ErrorKind::InvalidToken => "Invalid session token",
                ErrorKind::InvalidSignature => "Invalid session signature",
                ErrorKind::MissingRequiredClaim(_) => "Session token missing required claim",
                _ => "Session validation failed",
            };
            VerifyError::Invalid(reason.into())
        })
    }
}

#[async_trait::async_trait]
impl SessionVerifier for JwtSessionVerifier {
    async fn verify(
        &self,
        token: &str,
        check_revocation: bool,
    ) -> std::result::Result<VerifiedSession, VerifyError> {
        let claims = self.decode_claims(token)?;

        if claims.sub.trim().is_empty() {
            return Err(VerifyError::Invalid("Session has no subject".into()));
        }

        if check_revocation {
            if let Some(source) = &self.revocations {
                match source.tokens_valid_after(&claims.sub).await {
                    Ok(Some(cutoff)) if (claims.iat as i64) < cutoff.timestamp() => {
                        return Err(VerifyError::Invalid("Session revoked".into()));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(uid = %claims.sub, "Revocation check failed: {}", e);
                        return Err(VerifyError::Unavailable(e.to_string()));
                    }
                }
            }
        }

        Ok(VerifiedSession {
            uid: claims.sub,
            email_verified: claims.email_verified,
            claims: claims.claims,
        })
    }
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| GateError::Internal(format!("System time error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::ProfileRecord;
    use crate::db::MemoryProfileStore;

    fn test_verifier() -> JwtSessionVerifier {
        JwtSessionVerifier::new("test-secret-that-is-at-least-32-characters-long".into(), 3600)
            .unwrap()
    }

    struct DownSource;

    #[async_trait::async_trait]
    impl RevocationSource for DownSource {
        async fn tokens_valid_after(&self, _uid: &str) -> Result<Option<DateTime<Utc>>> {
            Err(GateError::UpstreamUnavailable("store down".into()))
        }
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let verifier = test_verifier();
        let token = verifier.issue("user-123", true).unwrap();

        let session = verifier.verify(&token, true).await.unwrap();
        assert_eq!(session.uid, "user-123");
        assert!(session.email_verified);
    }

    #[tokio::test]
    async fn test_malformed_token() {
        let verifier = test_verifier();
        let err = verifier.verify("not-a-jwt", true).await.unwrap_err();
        assert!(matches!(err, VerifyError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let other = JwtSessionVerifier::new(
            "different-secret-that-is-at-least-32-characters".into(),
            3600,
        )
        .unwrap();
        let token = other.issue("user-123", false).unwrap();

        let err = test_verifier().verify(&token, true).await.unwrap_err();
        assert!(matches!(err, VerifyError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let verifier = test_verifier();
        let now = unix_now().unwrap();
        let token = verifier
            .encode_claims(&SessionClaims {
                sub: "user-123".into(),
                email_verified: false,
                iat: now - 7200,
                exp: now - 3600,
                claims: Default::default(),
            })
            .unwrap();

        let err = verifier.verify(&token, true).await.unwrap_err();
        assert_eq!(err, VerifyError::Invalid("Session expired".into()));
    }

    #[tokio::test]
    async fn test_empty_subject_rejected() {
        let verifier = test_verifier();
        let now = unix_now().unwrap();
        let token = verifier
            .encode_claims(&SessionClaims {
                sub: "  ".into(),
                email_verified: false,
                iat: now,
                exp: now + 60,
                claims: Default::default(),
            })
            .unwrap();

        let err = verifier.verify(&token, true).await.unwrap_err();
        assert!(matches!(err, VerifyError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_revoked_session_rejected() {
        let store = Arc::new(MemoryProfileStore::new());
        let verifier = test_verifier().with_revocations(store.clone());
        let token = verifier.issue("user-123", true).unwrap();

        store.insert(
            "user-123",
            ProfileRecord {
                tokens_valid_after: Some(Utc::now() + chrono::Duration::seconds(30)),
                ..Default::default()
            },
        );

        let err = verifier.verify(&token, true).await.unwrap_err();
        assert_eq!(err, VerifyError::Invalid("Session revoked".into()));

        // Without the revocation check the signature alone is still valid
        assert!(verifier.verify(&token, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_session_after_cutoff_accepted() {
        let store = Arc::new(MemoryProfileStore::new());
        store.insert(
            "user-123",
            ProfileRecord {
                tokens_valid_after: Some(Utc::now() - chrono::Duration::hours(1)),
                ..Default::default()
            },
        );
        let verifier = test_verifier().with_revocations(store);
        let token = verifier.issue("user-123", true).unwrap();

        assert!(verifier.verify(&token, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_revocation_source_outage() {
        let verifier = test_verifier().with_revocations(Arc::new(DownSource));
        let token = verifier.issue("user-123", true).unwrap();

        let err = verifier.verify(&token, true).await.unwrap_err();
        assert!(matches!(err, VerifyError::Unavailable(_)));
    }

    #[test]
    fn test_secret_validation() {
        assert!(JwtSessionVerifier::new("short".into(), 3600).is_err());
        assert!(JwtSessionVerifier::new("".into(), 3600).is_err());
        let secret = "this-secret-is-at-least-32-chars-long".to_string();
        assert!(JwtSessionVerifier::new(secret, 3600).is_ok());
    }

    #[tokio::test]
    async fn test_dev_mode_verifier() {
        let verifier = JwtSessionVerifier::new_dev();
        let token = verifier.issue("dev-user", false).unwrap();
        assert!(verifier.verify(&token, true).await.is_ok());
    }
}
