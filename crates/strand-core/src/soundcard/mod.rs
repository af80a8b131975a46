//! Soundcard capability
//!
//! The engine consumes a soundcard, it never owns the hardware: the
//! trait exposes presets, the ring of application buffers, sequencer
//! timing (delay/attack) and the transport position, plus `tic()` to
//! advance one buffer period. Two implementations ship here:
//!
//! - [`OfflineSoundcard`] - manual ticks, used by tests and the exporter
//! - [`cpal_backend`] - live output; `tic()` is paced by hardware
//!   backpressure through a lock-free ring

pub mod cpal_backend;
mod error;
mod offline;

pub use error::{SoundcardError, SoundcardResult};
pub use offline::OfflineSoundcard;

use crate::buffer::AudioBuffer;
use crate::types::SampleFormat;

/// Stream parameters negotiated with the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundcardPresets {
    /// Audio channels per frame
    pub channels: usize,
    /// Sample rate in Hz
    pub samplerate: u32,
    /// Frames per buffer period
    pub buffer_size: usize,
    /// PCM format of the application buffers
    pub format: SampleFormat,
}

impl Default for SoundcardPresets {
    fn default() -> Self {
        Self {
            channels: 2,
            samplerate: crate::types::SAMPLE_RATE,
            buffer_size: crate::types::BUFFER_SIZE as usize,
            format: SampleFormat::S16,
        }
    }
}

/// Buffer periods per sequencer step
///
/// Sixteenth-note steps at factor 1/4: a higher delay factor packs more
/// steps into a beat.
pub fn absolute_delay(samplerate: u32, buffer_size: usize, bpm: f64, delay_factor: f64) -> f64 {
    60.0 * ((samplerate as f64 / buffer_size as f64) / bpm) * ((1.0 / 16.0) * (1.0 / delay_factor))
}

/// The capability the engine is driven by
///
/// Implementations own a small ring of application buffers (one
/// [`AudioBuffer`] per audio channel and slot). The engine mixes into
/// the current slot, the device plays the previous one; `tic()` rotates
/// the ring and advances the delay counter / note offset.
pub trait Soundcard: Send {
    fn presets(&self) -> SoundcardPresets;

    fn bpm(&self) -> f64;
    fn set_bpm(&mut self, bpm: f64);

    fn delay_factor(&self) -> f64;
    fn set_delay_factor(&mut self, delay_factor: f64);

    /// Buffer periods per sequencer step at the current tempo
    fn absolute_delay(&self) -> f64 {
        let presets = self.presets();
        absolute_delay(
            presets.samplerate,
            presets.buffer_size,
            self.bpm(),
            self.delay_factor(),
        )
    }

    /// Phase offset of the first step inside a buffer, in frames
    fn attack(&self) -> usize;

    /// Buffer periods elapsed since the current step began
    fn delay_counter(&self) -> f64;

    /// Transport position in sequencer steps
    fn note_offset(&self) -> u64;
    fn set_note_offset(&mut self, note_offset: u64);

    /// Transport position ignoring the loop, in sequencer steps
    fn note_offset_absolute(&self) -> u64;

    /// Frames elapsed since the stream started
    fn frame_count(&self) -> u64;

    /// Loop bounds `[left, right)` in steps, if looping
    fn loop_bounds(&self) -> Option<(u64, u64)>;
    fn set_loop_bounds(&mut self, bounds: Option<(u64, u64)>);

    /// The application buffer the engine is filling this period
    fn buffer_mut(&mut self) -> &mut [AudioBuffer];

    /// The application buffer the next period will fill
    fn next_buffer_mut(&mut self) -> &mut [AudioBuffer];

    /// The application buffer the device is playing this period
    fn prev_buffer(&self) -> &[AudioBuffer];

    /// Advance one buffer period
    ///
    /// Rotates the buffer ring, clears the new current slot, increments
    /// the delay counter and - when it completes a period - advances the
    /// note offset honoring the transport loop.
    fn tic(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_delay_defaults() {
        // 48kHz / 1024 frames / 120 bpm, 16th steps at factor 1/4
        let delay = absolute_delay(48000, 1024, 120.0, 0.25);
        assert!((delay - 5.859375).abs() < 1e-9);
    }

    #[test]
    fn test_absolute_delay_scales_with_bpm() {
        let slow = absolute_delay(48000, 1024, 60.0, 0.25);
        let fast = absolute_delay(48000, 1024, 240.0, 0.25);
        assert!((slow / fast - 4.0).abs() < 1e-9);
    }
}
