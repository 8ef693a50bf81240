//! HTTP surface of the gcPanel sign-in flow

pub mod http;

pub use http::{create_router, AppState};
