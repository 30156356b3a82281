//! HTTP server

pub mod guard;
pub mod http;
pub mod response;

pub use http::{dispatch, run, AppState};
