//! Recall mapping
//!
//! Builds the template containers a machine needs onto its audio node.
//! Mapping is idempotent: containers are keyed by (name, channel) and
//! re-mapping after a resize only adds what the new topology lacks, so
//! calling `map_recall` twice with the same arguments changes nothing.

use std::sync::{Arc, Mutex};

use super::buffer_channel::BufferChannel;
use super::copy_channel::{CopyChannel, CopyChannelRun};
use super::copy_pattern::{CopyPatternAudio, CopyPatternChannel, CopyPatternChannelRun};
use super::count_beats::CountBeatsAudioRun;
use super::delay_audio::DelayAudio;
use super::peak_channel::PeakChannel;
use super::play_master::{PlayAudio, PlayChannel, PlayChannelRun};
use super::play_notation::{FeedRecycling, NotationAudio, NotationChannel, NotationChannelRun};
use super::play_wave::{CaptureWaveAudio, PlayWaveChannelRun};
use super::plugin_bridge::PluginBridgeChannel;
use super::stream_signal::StreamSignal;
use super::volume_channel::{VolumeChannel, VolumeSignal};
use crate::engine::MasterRef;
use crate::graph::{Audio, Recycling};
use crate::plugin::PluginHost;
use crate::types::{ChannelId, ChannelKind};

/// The recyclings an output line plays: its own, or - pass-through -
/// the input recyclings on its audio channel
pub fn recyclings_for_output(audio: &Audio, line: usize) -> Vec<Arc<Mutex<Recycling>>> {
    let Some(channel) = audio.channel(ChannelKind::Output, line) else {
        return Vec::new();
    };
    if let Some(recycling) = channel.recycling() {
        return vec![Arc::clone(recycling)];
    }

    let audio_channel = channel.audio_channel();
    audio
        .channels(ChannelKind::Input)
        .iter()
        .filter(|input| input.audio_channel() == audio_channel)
        .filter_map(|input| input.recycling().map(Arc::clone))
        .collect()
}

/// Map the recall templates the audio's timelines require
///
/// `output_pad_start` names the pad index where newly added output
/// hardware begins; destination-dependent recalls only gain templates
/// for destinations from that pad on.
pub fn map_recall(audio: &mut Audio, output_pad_start: usize, master: &MasterRef) {
    map_audio_level(audio, master);
    map_input_channels(audio);
    map_output_channels(audio, master);
    map_copy_destinations(audio, output_pad_start);
}

fn map_audio_level(audio: &mut Audio, master: &MasterRef) {
    if audio.is_mapped() {
        return;
    }

    let (delay_template, tact) = DelayAudio::template();
    {
        let container = audio.add_container("delay");
        container.add_port(Arc::clone(&tact));
        container.add_template(delay_template);
    }

    let sequencer_length = audio.sequencer_length();
    let (count_template, count_ports) = CountBeatsAudioRun::template(tact, sequencer_length);
    {
        let container = audio.add_container("count-beats");
        for port in count_ports {
            container.add_port(port);
        }
        container.add_template(count_template);
    }

    if audio.flags().has_wave {
        let waves: Vec<_> = (0..audio.audio_channels())
            .filter_map(|audio_channel| audio.wave(audio_channel).map(Arc::clone))
            .collect();
        let (capture_template, record) = CaptureWaveAudio::template(waves, Arc::clone(master));
        let container = audio.add_container("capture-wave");
        container.add_port(record);
        container.add_template(capture_template);
    }

    audio.set_mapped();
    log::debug!("mapped audio-level recalls on {:?}", audio.id());
}

struct InputInfo {
    id: ChannelId,
    line: usize,
    audio_channel: usize,
    pattern: Option<Arc<Mutex<crate::timeline::Pattern>>>,
    recycling: Option<Arc<Mutex<Recycling>>>,
}

fn map_input_channels(audio: &mut Audio) {
    let inputs: Vec<InputInfo> = audio
        .channels(ChannelKind::Input)
        .iter()
        .filter(|channel| !channel.is_mapped())
        .map(|channel| InputInfo {
            id: channel.id(),
            line: channel.line(),
            audio_channel: channel.audio_channel(),
            pattern: channel.pattern().map(Arc::clone),
            recycling: channel.recycling().map(Arc::clone),
        })
        .collect();

    let has_notation = audio.flags().has_notation;
    let has_wave = audio.flags().has_wave;

    for input in inputs {
        let Some(recycling) = input.recycling else {
            continue;
        };

        if let Some(pattern) = &input.pattern {
            let bank_ports = CopyPatternAudio::bank_ports();
            let container = audio.add_container("copy-pattern");
            for port in &bank_ports {
                container.add_port(Arc::clone(port));
            }
            container.add_template(CopyPatternAudio::template(bank_ports.clone()));
            container.add_template(CopyPatternChannel::template(input.id));
            container.add_template(CopyPatternChannelRun::template(
                input.id,
                Arc::clone(pattern),
                Arc::clone(&recycling),
                bank_ports,
            ));
            container.add_template(StreamSignal::template(Arc::clone(&recycling)));
        } else if has_notation {
            if let Some(notation) = audio.notation(input.audio_channel).map(Arc::clone) {
                let container = audio.add_container("play-notation");
                container.add_template(NotationAudio::template());
                container.add_template(NotationChannel::template(input.id));
                container.add_template(NotationChannelRun::template(
                    input.id,
                    input.audio_channel,
                    notation,
                    Arc::clone(&recycling),
                ));
                container.add_template(FeedRecycling::template(Arc::clone(&recycling)));
                container.add_template(StreamSignal::template(Arc::clone(&recycling)));
            }
        } else if has_wave {
            if let Some(wave) = audio.wave(input.audio_channel).map(Arc::clone) {
                let container = audio.add_container("play-wave");
                container.add_template(PlayWaveChannelRun::template(
                    input.id,
                    wave,
                    Arc::clone(&recycling),
                ));
            }
        }

        // ambient channel effects
        let volume_ports = VolumeChannel::make_ports();
        {
            let container = audio.add_container("volume");
            for port in &volume_ports {
                container.add_port(Arc::clone(port));
            }
            container.add_template(VolumeChannel::template(input.id, volume_ports.clone()));
            container.add_template(VolumeSignal::template(
                Arc::clone(&recycling),
                volume_ports,
            ));
        }
        {
            let (peak_template, peak) = PeakChannel::template(input.id, Arc::clone(&recycling));
            let container = audio.add_container("peak");
            container.add_port(peak);
            container.add_template(peak_template);
        }

        if let Some(channel) = audio.channel_mut(ChannelKind::Input, input.line) {
            channel.set_mapped();
        }
    }
}

fn map_output_channels(audio: &mut Audio, master: &MasterRef) {
    // master playback runs on the first output pad only
    let outputs: Vec<(ChannelId, usize, usize)> = audio
        .channels(ChannelKind::Output)
        .iter()
        .filter(|channel| channel.pad() == 0)
        .map(|channel| (channel.id(), channel.line(), channel.audio_channel()))
        .collect();

    for (id, line, audio_channel) in outputs {
        if audio.container_for_channel("play-master", id).is_some() {
            continue;
        }
        let sources = recyclings_for_output(audio, line);
        let container = audio.add_container("play-master");
        container.add_template(PlayAudio::template());
        container.add_template(PlayChannel::template(id));
        container.add_template(PlayChannelRun::template(
            id,
            audio_channel,
            sources,
            Arc::clone(master),
        ));
    }
}

fn map_copy_destinations(audio: &mut Audio, output_pad_start: usize) {
    if !audio.flags().output_has_recycling {
        return;
    }

    let inputs: Vec<(ChannelId, usize, Arc<Mutex<Recycling>>)> = audio
        .channels(ChannelKind::Input)
        .iter()
        .filter_map(|channel| {
            channel
                .recycling()
                .map(|recycling| (channel.id(), channel.audio_channel(), Arc::clone(recycling)))
        })
        .collect();

    for (input_id, audio_channel, source) in inputs {
        // every destination output channel reachable from the new pads
        let destinations: Vec<(ChannelId, Arc<Mutex<Recycling>>)> = audio
            .channels(ChannelKind::Output)
            .iter()
            .filter(|output| {
                output.audio_channel() == audio_channel && output.pad() >= output_pad_start
            })
            .filter_map(|output| {
                output
                    .recycling()
                    .map(|recycling| (output.id(), Arc::clone(recycling)))
            })
            .collect();
        if destinations.is_empty() {
            continue;
        }

        if audio.container_for_channel("copy", input_id).is_none() {
            let container = audio.add_container("copy");
            container.add_template(CopyChannel::template(input_id));
        }
        let container = audio
            .container_for_channel_mut("copy", input_id)
            .expect("copy container just ensured");
        for (destination_id, destination) in destinations {
            if container.has_destination(destination_id) {
                continue;
            }
            container.add_template(CopyChannelRun::template(
                input_id,
                destination_id,
                Arc::clone(&source),
                destination,
            ));
        }
    }
}

/// Map the link bridge onto an input channel after `set_link`
pub fn map_buffer_recall(
    audio: &mut Audio,
    line: usize,
    upstream: Vec<Arc<Mutex<Recycling>>>,
) {
    let Some(channel) = audio.channel(ChannelKind::Input, line) else {
        return;
    };
    let id = channel.id();
    let Some(local) = channel.recycling().map(Arc::clone) else {
        return;
    };
    if audio.container_for_channel("buffer", id).is_some() {
        return;
    }

    let container = audio.add_container("buffer");
    container.add_template(BufferChannel::template(id, upstream, local));
}

/// Attach an external plugin onto an input channel
pub fn map_plugin(audio: &mut Audio, line: usize, host: Arc<dyn PluginHost>) {
    let Some(channel) = audio.channel(ChannelKind::Input, line) else {
        return;
    };
    let id = channel.id();
    let Some(recycling) = channel.recycling().map(Arc::clone) else {
        return;
    };

    let name = format!("plugin-{}", host.descriptor().name);
    if audio.container_for_channel(&name, id).is_some() {
        return;
    }

    let (template, ports) = PluginBridgeChannel::template(id, host, recycling);
    let container = audio.add_container(name);
    for port in ports {
        container.add_port(port);
    }
    container.add_template(template);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc::GcService;
    use crate::engine::MasterBus;
    use crate::graph::AudioFlags;
    use crate::soundcard::SoundcardPresets;
    use crate::timeline::Pattern;
    use crate::types::AudioId;

    fn pattern_audio(gc: &GcService) -> Audio {
        let flags = AudioFlags {
            input_has_recycling: true,
            r#async: true,
            ..AudioFlags::default()
        };
        let mut audio = Audio::new(
            AudioId(0),
            "drums",
            SoundcardPresets::default(),
            flags,
            2,
            2,
            1,
            &gc.handle(),
        );
        for channel in audio.channels_mut(ChannelKind::Input) {
            channel.set_pattern(Pattern::new(4, 12, 16));
        }
        audio
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let gc = GcService::new();
        let master = MasterBus::new(SoundcardPresets::default());
        let mut audio = pattern_audio(&gc);

        map_recall(&mut audio, 0, &master);
        let count = audio.containers().len();
        let templates: usize = audio
            .containers()
            .iter()
            .map(|c| c.templates().len())
            .sum();

        map_recall(&mut audio, 0, &master);
        assert_eq!(audio.containers().len(), count);
        let templates_after: usize = audio
            .containers()
            .iter()
            .map(|c| c.templates().len())
            .sum();
        assert_eq!(templates, templates_after, "no duplicate templates");
    }

    #[test]
    fn test_one_play_chain_per_audio_channel() {
        // 2 output pads, 1 input pad, 2 audio channels
        let gc = GcService::new();
        let master = MasterBus::new(SoundcardPresets::default());
        let mut audio = pattern_audio(&gc);

        map_recall(&mut audio, 0, &master);

        let play_containers: Vec<_> = audio
            .containers()
            .iter()
            .filter(|c| c.name() == "play-master")
            .collect();
        assert_eq!(
            play_containers.len(),
            audio.audio_channels(),
            "exactly one play chain per audio channel"
        );
        for container in play_containers {
            assert_eq!(container.templates().len(), 3);
        }
    }

    #[test]
    fn test_pattern_channels_get_sequencer_chain() {
        let gc = GcService::new();
        let master = MasterBus::new(SoundcardPresets::default());
        let mut audio = pattern_audio(&gc);
        map_recall(&mut audio, 0, &master);

        let pattern_containers = audio
            .containers()
            .iter()
            .filter(|c| c.name() == "copy-pattern")
            .count();
        assert_eq!(pattern_containers, 2, "one per input channel");

        assert!(audio.container("delay").is_some());
        assert!(audio.container("count-beats").is_some());
    }

    #[test]
    fn test_resize_then_remap_adds_only_new_destinations() {
        let gc = GcService::new();
        let master = MasterBus::new(SoundcardPresets::default());
        let flags = AudioFlags {
            input_has_recycling: true,
            output_has_recycling: true,
            ..AudioFlags::default()
        };
        let mut audio = Audio::new(
            AudioId(0),
            "mixer",
            SoundcardPresets::default(),
            flags,
            1,
            2,
            1,
            &gc.handle(),
        );
        map_recall(&mut audio, 0, &master);

        let copy = audio
            .container_for_channel("copy", ChannelId::new(AudioId(0), ChannelKind::Input, 0))
            .unwrap();
        // channel-level template + one run per destination pad
        assert_eq!(copy.templates().len(), 3);

        audio.resize_pads(ChannelKind::Output, 4, &gc.handle());
        map_recall(&mut audio, 2, &master);

        let copy = audio
            .container_for_channel("copy", ChannelId::new(AudioId(0), ChannelKind::Input, 0))
            .unwrap();
        assert_eq!(copy.templates().len(), 5, "two new destinations added");
    }

    #[test]
    fn test_map_plugin() {
        let gc = GcService::new();
        let master = MasterBus::new(SoundcardPresets::default());
        let mut audio = pattern_audio(&gc);
        map_recall(&mut audio, 0, &master);

        let host: Arc<dyn PluginHost> = Arc::new(crate::plugin::native::GainHost::new());
        map_plugin(&mut audio, 0, Arc::clone(&host));
        map_plugin(&mut audio, 0, host);

        let count = audio
            .containers()
            .iter()
            .filter(|c| c.name() == "plugin-gain")
            .count();
        assert_eq!(count, 1);
    }
}
