//! Wave timeline
//!
//! Raw sample clips anchored at absolute frame offsets, in buffer-size
//! granules. Wave playback streams the granules into signals; wave
//! capture appends the master bus here one granule per tick.

use std::collections::BTreeMap;

use crate::buffer::AudioBuffer;
use crate::types::SampleFormat;

/// One channel's recorded/placed sample data
#[derive(Debug, Clone)]
pub struct Wave {
    samplerate: u32,
    buffer_size: usize,
    format: SampleFormat,
    /// Granules keyed by their absolute first frame
    buffers: BTreeMap<u64, AudioBuffer>,
}

impl Wave {
    pub fn new(samplerate: u32, buffer_size: usize, format: SampleFormat) -> Self {
        Self {
            samplerate,
            buffer_size,
            format,
            buffers: BTreeMap::new(),
        }
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Number of granules held
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Place a granule at `frame`, snapped down to granule granularity
    ///
    /// Mismatched-length buffers are rejected so the playback cursor
    /// arithmetic stays uniform.
    pub fn add_buffer(&mut self, frame: u64, buffer: AudioBuffer) {
        if buffer.len() != self.buffer_size {
            log::warn!(
                "wave: rejecting buffer of {} frames (granule size {})",
                buffer.len(),
                self.buffer_size
            );
            return;
        }
        let frame = frame - (frame % self.buffer_size as u64);
        self.buffers.insert(frame, buffer);
    }

    /// The granule starting at or covering `frame`, if any
    pub fn find_buffer(&self, frame: u64) -> Option<&AudioBuffer> {
        let snapped = frame - (frame % self.buffer_size as u64);
        self.buffers.get(&snapped)
    }

    /// First frame past the last granule
    pub fn frame_count(&self) -> u64 {
        self.buffers
            .keys()
            .next_back()
            .map(|&frame| frame + self.buffer_size as u64)
            .unwrap_or(0)
    }
}
