//! HTTP routes

pub mod features;
pub mod health;
pub mod onboarding;
pub mod user;

pub use features::handle_feature;
pub use health::health_check;
pub use onboarding::handle_accept_terms;
pub use user::handle_get_user;
