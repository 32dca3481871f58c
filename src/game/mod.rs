//! Archipelago client side of the relay.
//!
//! - `client`: one server session
//! - `formatter`: chat formatting and message splitting
//! - `upstream`: reconnect loop around sessions

pub mod client;
pub mod formatter;
pub mod upstream;

pub use upstream::Upstream;
