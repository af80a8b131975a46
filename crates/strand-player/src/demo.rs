//! Demo song construction
//!
//! Builds one pattern machine with synthesized drum templates so the
//! player makes sound without any sample files on disk.

use strand_core::buffer::AudioBuffer;
use strand_core::engine::Engine;
use strand_core::graph::AudioFlags;
use strand_core::timeline::Pattern;
use strand_core::types::{AudioId, ChannelKind, SoundScope};

/// Lanes of the demo kit, one input pad each
const LANES: usize = 2;

/// Fill a recycling template with a synthesized one-shot
fn fill_template(engine: &Engine, audio: AudioId, line: usize, samples: &[f32]) {
    let Some(node) = engine.audio(audio) else {
        return;
    };
    let Some(channel) = node.channel(ChannelKind::Input, line) else {
        return;
    };
    let Some(recycling) = channel.recycling() else {
        return;
    };
    let recycling = recycling.lock().expect("recycling lock poisoned");
    let mut template = recycling.template().lock().expect("template lock poisoned");

    let buffer_size = template.buffer_size();
    let format = template.format();
    let buffers = samples.len().div_ceil(buffer_size);
    template.stream_resize(buffers);
    for index in 0..buffers {
        let start = index * buffer_size;
        let end = (start + buffer_size).min(samples.len());
        let mut chunk = vec![0.0f32; buffer_size];
        chunk[..end - start].copy_from_slice(&samples[start..end]);
        if let Some(buffer) = template.buffer_at_mut(index) {
            *buffer = AudioBuffer::from_samples(format, &chunk);
        }
    }
}

/// Decaying sine - the kick lane
fn kick(samplerate: u32) -> Vec<f32> {
    let length = samplerate as usize / 8;
    (0..length)
        .map(|i| {
            let t = i as f32 / samplerate as f32;
            let envelope = (-t * 18.0).exp();
            let sweep = 120.0 - 60.0 * (t * 8.0).min(1.0);
            (2.0 * std::f32::consts::PI * sweep * t).sin() * envelope * 0.8
        })
        .collect()
}

/// Noise burst - the hat lane
fn hat(samplerate: u32) -> Vec<f32> {
    let length = samplerate as usize / 32;
    let mut state = 0x2545_f491u32;
    (0..length)
        .map(|i| {
            // xorshift noise, no RNG dependency needed for a demo hiss
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = (state as f32 / u32::MAX as f32) * 2.0 - 1.0;
            let envelope = 1.0 - i as f32 / length as f32;
            noise * envelope * envelope * 0.3
        })
        .collect()
}

/// Build the demo machine and return its id
pub fn build(engine: &mut Engine) -> AudioId {
    let flags = AudioFlags {
        input_has_recycling: true,
        r#async: true,
        ..AudioFlags::default()
    };
    let id = engine.add_audio("demo-kit", flags, 1, 1, LANES);

    let samplerate = engine.presets().samplerate;
    {
        let node = engine.audio_mut(id).expect("audio just added");
        let mut kick_pattern = Pattern::new(1, 1, 16);
        for bit in [0, 4, 8, 12] {
            kick_pattern.set_bit(0, 0, bit, true);
        }
        let mut hat_pattern = Pattern::new(1, 1, 16);
        for bit in (2..16).step_by(4) {
            hat_pattern.set_bit(0, 0, bit, true);
        }
        let channels = node.channels_mut(ChannelKind::Input);
        channels[0].set_pattern(kick_pattern);
        channels[1].set_pattern(hat_pattern);
    }

    fill_template(engine, id, 0, &kick(samplerate));
    fill_template(engine, id, 1, &hat(samplerate));

    engine.map_recall(id, 0);
    id
}

/// Start the demo sequence
pub fn start(engine: &mut Engine, id: AudioId) -> anyhow::Result<()> {
    engine
        .start_audio(id, SoundScope::Sequencer)
        .map_err(anyhow::Error::msg)
}
