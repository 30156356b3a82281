//! Document schemas read by the gate

mod user;

pub use user::{accept_terms_update, uid_filter, Membership, ProfileRecord, USER_COLLECTION};
