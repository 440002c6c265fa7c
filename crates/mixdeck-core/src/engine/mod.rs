//! Audio engine - channels, strip stages, commands, and the mix bus

pub mod channel;
pub mod command;
pub mod compressor;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod eq;
pub mod filter;
pub mod mixer;

pub use channel::{Channel, ChannelAtomics};
pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_SIZE};
pub use compressor::Compressor;
pub use engine::MixEngine;
pub use eq::{eq_value_to_db, ThreeBandEq};
pub use filter::{ChannelFilter, MAX_CUTOFF, MIN_CUTOFF};
pub use mixer::{crossfade_gains, MixBus};
