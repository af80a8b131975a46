//! CPAL output backend
//!
//! The engine thread keeps mixing into an [`OfflineSoundcard`]-style
//! buffer ring; finished periods are interleaved into a lock-free ring
//! drained by the cpal callback. `tic()` blocks while the ring is full,
//! so the hardware clock paces the engine without the engine ever
//! running inside the device callback.
//!
//! The cpal stream itself is not `Send`; the caller keeps the returned
//! [`CpalOutputHandle`] alive on its own thread and hands the
//! [`CpalSoundcard`] to the audio loop.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{OfflineSoundcard, Soundcard, SoundcardError, SoundcardPresets, SoundcardResult};
use crate::buffer::AudioBuffer;

/// Ring capacity in buffer periods
const RING_PERIODS: usize = 8;

/// Keeps the output stream alive; drop to stop audio
pub struct CpalOutputHandle {
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl CpalOutputHandle {
    /// Sample rate the device actually opened with
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Soundcard paced by hardware backpressure
pub struct CpalSoundcard {
    inner: OfflineSoundcard,
    producer: rtrb::Producer<f32>,
}

impl Soundcard for CpalSoundcard {
    fn presets(&self) -> SoundcardPresets {
        self.inner.presets()
    }

    fn bpm(&self) -> f64 {
        self.inner.bpm()
    }

    fn set_bpm(&mut self, bpm: f64) {
        self.inner.set_bpm(bpm);
    }

    fn delay_factor(&self) -> f64 {
        self.inner.delay_factor()
    }

    fn set_delay_factor(&mut self, delay_factor: f64) {
        self.inner.set_delay_factor(delay_factor);
    }

    fn attack(&self) -> usize {
        self.inner.attack()
    }

    fn delay_counter(&self) -> f64 {
        self.inner.delay_counter()
    }

    fn note_offset(&self) -> u64 {
        self.inner.note_offset()
    }

    fn set_note_offset(&mut self, note_offset: u64) {
        self.inner.set_note_offset(note_offset);
    }

    fn note_offset_absolute(&self) -> u64 {
        self.inner.note_offset_absolute()
    }

    fn frame_count(&self) -> u64 {
        self.inner.frame_count()
    }

    fn loop_bounds(&self) -> Option<(u64, u64)> {
        self.inner.loop_bounds()
    }

    fn set_loop_bounds(&mut self, bounds: Option<(u64, u64)>) {
        self.inner.set_loop_bounds(bounds);
    }

    fn buffer_mut(&mut self) -> &mut [AudioBuffer] {
        self.inner.buffer_mut()
    }

    fn next_buffer_mut(&mut self) -> &mut [AudioBuffer] {
        self.inner.next_buffer_mut()
    }

    fn prev_buffer(&self) -> &[AudioBuffer] {
        self.inner.prev_buffer()
    }

    fn tic(&mut self) {
        let presets = self.inner.presets();
        let frames = presets.buffer_size;
        let needed = frames * presets.channels;

        // wait for the device to drain a period's worth of space
        while self.producer.slots() < needed {
            std::thread::sleep(Duration::from_micros(500));
        }

        // interleave the finished period into the device ring
        let channels: Vec<Vec<f32>> = self
            .inner
            .buffer_mut()
            .iter()
            .map(|buffer| buffer.to_samples())
            .collect();
        for frame in 0..frames {
            for channel in &channels {
                let _ = self.producer.push(channel[frame]);
            }
        }

        self.inner.tic();
    }
}

/// Open the default output device and start the stream
pub fn start_output(
    presets: SoundcardPresets,
) -> SoundcardResult<(CpalOutputHandle, CpalSoundcard)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(SoundcardError::NoDevices)?;

    let config = cpal::StreamConfig {
        channels: presets.channels as u16,
        sample_rate: cpal::SampleRate(presets.samplerate),
        buffer_size: cpal::BufferSize::Default,
    };

    let capacity = presets.buffer_size * presets.channels * RING_PERIODS;
    let (producer, mut consumer) = rtrb::RingBuffer::<f32>::new(capacity);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    // underruns degrade to silence
                    *sample = consumer.pop().unwrap_or(0.0);
                }
            },
            |err| log::error!("cpal stream error: {}", err),
            None,
        )
        .map_err(|e| SoundcardError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| SoundcardError::StreamPlayError(e.to_string()))?;

    log::info!(
        "cpal output started: {} ch @ {} Hz, {} frame periods",
        presets.channels,
        presets.samplerate,
        presets.buffer_size
    );

    Ok((
        CpalOutputHandle {
            _stream: stream,
            sample_rate: presets.samplerate,
        },
        CpalSoundcard {
            inner: OfflineSoundcard::new(presets),
            producer,
        },
    ))
}
