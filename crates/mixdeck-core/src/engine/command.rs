//! Control-to-audio command queue
//!
//! All engine mutations travel through a lock-free SPSC ring from the
//! control side to the audio callback, which drains the queue at buffer
//! boundaries. Commands on unknown channel ids are no-ops by design.

use std::sync::Arc;

use crate::effect::Effect;
use crate::engine::channel::ChannelAtomics;
use crate::types::{EqBand, FilterKind, StereoBuffer};

/// Capacity of the command ring; overflow drops the command with a warning
pub const COMMAND_QUEUE_SIZE: usize = 256;

pub enum EngineCommand {
    /// Register a channel under `id`; no-op when it already exists
    CreateChannel {
        id: String,
        atomics: Arc<ChannelAtomics>,
    },
    /// Drop a channel and everything on it
    RemoveChannel { id: String },
    /// Attach a decoded source and start playback, replacing any prior one
    AttachSource {
        id: String,
        buffer: Arc<StereoBuffer>,
        tap: rtrb::Producer<f32>,
    },
    StopSource { id: String },
    /// Linear amplitude, clamped to [0, 1] at the channel
    SetGain { id: String, gain: f32 },
    /// Band gain already mapped to dB by the control side
    SetEq {
        id: String,
        band: EqBand,
        gain_db: f32,
    },
    SetFilter {
        id: String,
        cutoff: f32,
        kind: FilterKind,
    },
    /// Append a pre-built insert effect to the channel's chain
    AddEffect { id: String, effect: Box<dyn Effect> },
    /// Playback-rate multiplier; ignored on channels without a source
    SetPlaybackRate { id: String, rate: f64 },
    /// Crossfader position in [-1, 1]
    SetCrossfader { position: f32 },
    /// Master output gain
    SetMasterGain { gain: f32 },
    /// Stop all sources and clear the channel registry
    DisposeAll,
}

/// Create the control/audio command pair
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_SIZE);
    (producer, consumer)
}
