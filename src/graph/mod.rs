//! Microsoft Graph access.
//!
//! - `client` - bearer-authenticated JSON transport
//! - `models` - request/response types
//! - `service` - the operations the menu drives

pub mod client;
pub mod models;
pub mod service;

pub use client::build_http_client;
pub use service::GraphService;
