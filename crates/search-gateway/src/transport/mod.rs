//! Network transport

mod http;

pub use http::{build_app, run_http, serve};
