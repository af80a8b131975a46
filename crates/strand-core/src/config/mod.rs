//! Engine configuration
//!
//! YAML-backed engine settings plus generic load/save helpers. Apps
//! layer their own config structs on top of the same helpers.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::default_config_path;

use serde::{Deserialize, Serialize};

use crate::soundcard::SoundcardPresets;
use crate::types::{SampleFormat, BUFFER_SIZE, DEFAULT_BPM, DEFAULT_DELAY_FACTOR, SAMPLE_RATE};

/// Engine settings persisted between sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub samplerate: u32,
    /// Frames per buffer period
    pub buffer_size: usize,
    /// PCM format of the signal chain
    pub format: SampleFormat,
    /// Audio channels on the master bus
    pub channels: usize,
    /// Transport tempo
    pub bpm: f64,
    /// Sequencer step subdivision factor
    pub delay_factor: f64,
    /// Stage voices across a channel-thread team
    pub super_threaded: bool,
    /// Channel threads when super-threaded (0 = one per cpu)
    pub channel_threads: usize,
    /// Off-band worker threads for file I/O
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            samplerate: SAMPLE_RATE,
            buffer_size: BUFFER_SIZE as usize,
            format: SampleFormat::S16,
            channels: 2,
            bpm: DEFAULT_BPM,
            delay_factor: DEFAULT_DELAY_FACTOR,
            super_threaded: false,
            channel_threads: 2,
            worker_threads: 2,
        }
    }
}

impl EngineConfig {
    /// Soundcard presets matching this configuration
    pub fn presets(&self) -> SoundcardPresets {
        SoundcardPresets {
            channels: self.channels,
            samplerate: self.samplerate,
            buffer_size: self.buffer_size,
            format: self.format,
        }
    }
}
