//! daymark-remote: HTTP implementation of the daymark-core storage and
//! auth contracts. Any REST backend exposing the documented endpoint
//! shapes is conformant; nothing here depends on a specific vendor.

pub mod auth;
pub mod client;

pub use auth::{AuthClient, Session};
pub use client::RemoteStore;
