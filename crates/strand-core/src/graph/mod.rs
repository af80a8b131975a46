//! The audio graph
//!
//! Audio nodes own their channels by index; channels back-reference by
//! id. Topology is mutated only by the task layer between ticks; the
//! staged pass reads it and touches nothing but its own recall state
//! and the signals it holds references to.

mod audio;
mod audio_signal;
mod channel;
mod recycling;

pub use audio::{Audio, AudioFlags};
pub use audio_signal::AudioSignal;
pub use channel::Channel;
pub use recycling::{Recycling, SignalRef};
