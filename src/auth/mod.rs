//! Authentication and authorization
//!
//! Provides:
//! - Session token resolution into an `Identity`
//! - JWT session verification with revocation cut-offs
//! - Tier/role entitlement evaluation from stored profiles
//! - Feature gates for member routes

pub mod entitlements;
pub mod gates;
pub mod jwt;
pub mod session;
pub mod tier;

pub use entitlements::{derive_roles, derive_tier, EntitlementEvaluator, Entitlements, RoleKey};
pub use gates::{get_feature_name, get_required_gate, Gate};
pub use jwt::{JwtSessionVerifier, RevocationSource, SessionClaims};
pub use session::{
    extract_session_token, Identity, SessionResolver, SessionVerifier, VerifiedSession,
    VerifyError,
};
pub use tier::Tier;
