//! Common types for Strand
//!
//! This module contains the fundamental types shared across the engine:
//! sample formats, sound scopes, typed graph ids and engine-wide
//! constants.

/// Default sample rate (48kHz - standard professional audio rate)
/// This is the default; the actual rate comes from the soundcard presets.
pub const SAMPLE_RATE: u32 = 48000;

/// Default buffer size in frames per audio channel
pub const BUFFER_SIZE: u32 = 1024;

/// Default beats per minute
pub const DEFAULT_BPM: f64 = 120.0;

/// Default delay factor (sequencer steps are 16ths at factor 1/4)
pub const DEFAULT_DELAY_FACTOR: f64 = 0.25;

/// Maximum steps a pattern can hold per bank page
pub const PATTERN_MAX_LENGTH: usize = 256;

/// Processing sample type used by the mixing paths
pub type Sample = f32;

/// PCM sample formats supported by buffers and the soundcard
///
/// S24 samples travel in a 32-bit container with the upper byte unused,
/// matching what PCM hardware and file formats expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SampleFormat {
    S8,
    S16,
    S24,
    S32,
    S64,
    Float,
    Double,
}

impl SampleFormat {
    /// All formats in conversion-matrix order
    pub const ALL: [SampleFormat; 7] = [
        SampleFormat::S8,
        SampleFormat::S16,
        SampleFormat::S24,
        SampleFormat::S32,
        SampleFormat::S64,
        SampleFormat::Float,
        SampleFormat::Double,
    ];

    /// Size of one sample in bytes (container size, not payload bits)
    pub fn sample_size(&self) -> usize {
        match self {
            SampleFormat::S8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 | SampleFormat::S32 | SampleFormat::Float => 4,
            SampleFormat::S64 | SampleFormat::Double => 8,
        }
    }

    /// Name for display and config files
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::S8 => "s8",
            SampleFormat::S16 => "s16",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
            SampleFormat::S64 => "s64",
            SampleFormat::Float => "float",
            SampleFormat::Double => "double",
        }
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::S16
    }
}

/// The scope a voice plays in
///
/// A voice started from the pattern sequencer, from the notation editor
/// and from plain playback each get their own scope so they can be
/// started and cancelled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum SoundScope {
    Playback = 0,
    Sequencer = 1,
    Notation = 2,
    Wave = 3,
}

impl SoundScope {
    /// All scopes in order
    pub const ALL: [SoundScope; 4] = [
        SoundScope::Playback,
        SoundScope::Sequencer,
        SoundScope::Notation,
        SoundScope::Wave,
    ];

    /// Get the name of this scope
    pub fn name(&self) -> &'static str {
        match self {
            SoundScope::Playback => "playback",
            SoundScope::Sequencer => "sequencer",
            SoundScope::Notation => "notation",
            SoundScope::Wave => "wave",
        }
    }
}

/// Identifier of an Audio node inside the engine arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioId(pub usize);

/// Which side of an Audio a channel sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Output,
    Input,
}

/// Identifier of a Channel: owning audio, side, and line index
///
/// The line index is `pad * audio_channels + audio_channel`. Pad
/// resizes keep surviving lines stable; an audio-channel resize
/// renumbers every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId {
    pub audio: AudioId,
    pub kind: ChannelKind,
    pub line: usize,
}

impl ChannelId {
    pub fn new(audio: AudioId, kind: ChannelKind, line: usize) -> Self {
        Self { audio, kind, line }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_sizes() {
        assert_eq!(SampleFormat::S8.sample_size(), 1);
        assert_eq!(SampleFormat::S16.sample_size(), 2);
        assert_eq!(SampleFormat::S24.sample_size(), 4);
        assert_eq!(SampleFormat::S32.sample_size(), 4);
        assert_eq!(SampleFormat::S64.sample_size(), 8);
        assert_eq!(SampleFormat::Float.sample_size(), 4);
        assert_eq!(SampleFormat::Double.sample_size(), 8);
    }

    #[test]
    fn test_sound_scope_names() {
        assert_eq!(SoundScope::ALL.len(), 4);
        assert_eq!(SoundScope::Sequencer.name(), "sequencer");
        assert_eq!(SoundScope::Notation as usize, 2);
    }

    #[test]
    fn test_channel_id() {
        let id = ChannelId::new(AudioId(3), ChannelKind::Input, 5);
        assert_eq!(id.audio, AudioId(3));
        assert_eq!(id.line, 5);
        assert_ne!(
            ChannelId::new(AudioId(3), ChannelKind::Output, 5),
            id
        );
    }
}
