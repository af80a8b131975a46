//! Master bus
//!
//! The playback recalls mix every audible signal into this bus during
//! `run_inter`; after `run_post` the audio loop copies it into the
//! soundcard's application buffer, feeds the export writer and clears
//! it for the next tick.

use std::sync::{Arc, Mutex};

use crate::buffer::{copy_buffer_to_buffer, AudioBuffer, CopyMode};
use crate::soundcard::SoundcardPresets;

/// Shared handle to the master bus
pub type MasterRef = Arc<Mutex<MasterBus>>;

/// One buffer period of mixed output, one buffer per audio channel
pub struct MasterBus {
    presets: SoundcardPresets,
    buffers: Vec<AudioBuffer>,
}

impl MasterBus {
    pub fn new(presets: SoundcardPresets) -> MasterRef {
        let buffers = (0..presets.channels)
            .map(|_| AudioBuffer::silence(presets.format, presets.buffer_size))
            .collect();
        Arc::new(Mutex::new(Self { presets, buffers }))
    }

    pub fn presets(&self) -> SoundcardPresets {
        self.presets
    }

    pub fn buffers(&self) -> &[AudioBuffer] {
        &self.buffers
    }

    /// Mix one source buffer into an audio channel, converting formats
    pub fn mix(&mut self, audio_channel: usize, source: &AudioBuffer) {
        let Some(target) = self.buffers.get_mut(audio_channel) else {
            return;
        };
        let mode = CopyMode::new(target.format(), source.format());
        let count = target.len().min(source.len());
        copy_buffer_to_buffer(target, 0, source, 0, count, mode);
    }

    /// Zero the bus for the next tick
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
    }

    /// Peak across all channels, normalized to [0, 1]
    pub fn peak(&self) -> f64 {
        self.buffers.iter().map(|b| b.peak()).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleFormat;

    #[test]
    fn test_mix_and_clear() {
        let presets = SoundcardPresets {
            channels: 2,
            buffer_size: 4,
            format: SampleFormat::S16,
            ..SoundcardPresets::default()
        };
        let master = MasterBus::new(presets);
        let mut master = master.lock().unwrap();

        let source = AudioBuffer::S16(vec![100, 200, 300, 400].into_boxed_slice());
        master.mix(0, &source);
        master.mix(0, &source);

        assert_eq!(
            master.buffers()[0],
            AudioBuffer::S16(vec![200, 400, 600, 800].into_boxed_slice())
        );
        assert_eq!(master.buffers()[1], AudioBuffer::silence(SampleFormat::S16, 4));

        master.clear();
        assert_eq!(master.peak(), 0.0);
    }

    #[test]
    fn test_mix_out_of_range_channel_ignored() {
        let master = MasterBus::new(SoundcardPresets {
            channels: 1,
            buffer_size: 2,
            format: SampleFormat::S16,
            ..SoundcardPresets::default()
        });
        let mut master = master.lock().unwrap();
        master.mix(5, &AudioBuffer::S16(vec![1, 2].into_boxed_slice()));
        assert_eq!(master.peak(), 0.0);
    }
}
