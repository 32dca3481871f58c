//! Relay core between the Archipelago server and Discord.
//!
//! - `channels`: task channel wiring (`ChannelBundle`)
//! - `classifier`: packet classification into channel categories
//! - `dedup`: recently relayed text cache
//! - `filter`: regex message filters
//! - `orchestrator`: the `Relay` pipeline
//! - `state`: live channel map

pub mod channels;
pub mod classifier;
pub mod dedup;
pub mod filter;
pub mod orchestrator;
pub mod state;

pub use channels::ChannelBundle;
pub use orchestrator::Relay;
pub use state::ChannelMap;
