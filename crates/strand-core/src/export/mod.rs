//! WAV export
//!
//! Renders the master bus to disk: live (a writer attached to the
//! running engine captures n frames) or offline (the engine is driven
//! against its offline soundcard until the frame count is reached).
//! Finalization is pushed to the worker pool so the audio thread never
//! waits on the filesystem.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::{Engine, MasterBus};
use crate::soundcard::SoundcardPresets;

/// Errors surfaced when setting up or finishing an export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("WAV I/O failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Timestamped default filename in the working directory
pub fn default_export_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("strand-{}.wav", stamp))
}

/// Incremental WAV writer fed one master-bus period per tick
pub struct ExportWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    remaining: u64,
    channels: usize,
    scratch: Vec<f32>,
}

impl ExportWriter {
    pub fn create(path: &Path, presets: SoundcardPresets, frames: u64) -> ExportResult<Self> {
        let spec = hound::WavSpec {
            channels: presets.channels as u16,
            sample_rate: presets.samplerate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        log::info!(
            "export started: {} frames to {}",
            frames,
            path.display()
        );
        Ok(Self {
            writer: Some(writer),
            remaining: frames,
            channels: presets.channels,
            scratch: vec![0.0; presets.buffer_size * presets.channels],
        })
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Append one tick's master mix; returns true once complete
    pub fn write_tick(&mut self, master: &MasterBus) -> bool {
        let Some(writer) = self.writer.as_mut() else {
            return true;
        };
        let buffers = master.buffers();
        let buffer_size = buffers.first().map(|b| b.len()).unwrap_or(0);
        let frames = (self.remaining.min(buffer_size as u64)) as usize;

        // interleave into the scratch buffer
        for (channel, buffer) in buffers.iter().take(self.channels).enumerate() {
            let offset = channel * buffer_size;
            buffer.copy_to_f32(&mut self.scratch[offset..offset + buffer_size]);
        }
        for frame in 0..frames {
            for channel in 0..self.channels {
                let sample = self.scratch[channel * buffer_size + frame];
                let value = ((sample as f64).clamp(-1.0, 1.0) * 32767.0) as i16;
                if let Err(e) = writer.write_sample(value) {
                    log::error!("export write failed, aborting: {}", e);
                    self.remaining = 0;
                    return true;
                }
            }
        }

        self.remaining -= frames as u64;
        self.remaining == 0
    }

    /// Take the inner writer for off-thread finalization
    pub fn take_writer(&mut self) -> Option<hound::WavWriter<BufWriter<File>>> {
        self.writer.take()
    }
}

/// Drive an engine against its soundcard until `frames` are rendered
///
/// Intended for the offline soundcard; with a live backend this renders
/// in real time.
pub fn render_offline(engine: &mut Engine, frames: u64, path: &Path) -> ExportResult<()> {
    let writer = ExportWriter::create(path, engine.presets(), frames)?;
    engine.attach_export(writer);
    while engine.is_exporting() {
        engine.process_tasks();
        engine.tick();
    }
    Ok(())
}
