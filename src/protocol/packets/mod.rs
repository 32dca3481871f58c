//! Archipelago packet definitions and frame codec.

pub mod client;
pub mod codec;
pub mod server;

pub use client::*;
pub use codec::*;
pub use server::*;
