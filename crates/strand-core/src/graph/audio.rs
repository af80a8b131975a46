//! Audio - the top-level mixer/instrument node

use std::sync::{Arc, Mutex};

use basedrop::Handle;

use super::Channel;
use crate::recall::{ContainerId, RecallContainer};
use crate::soundcard::SoundcardPresets;
use crate::timeline::{Notation, Wave};
use crate::types::{AudioId, ChannelId, ChannelKind};
use crate::voice::RecallId;

/// Behavior flags of an audio node
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioFlags {
    /// Output channels bear the signal chain
    pub output_has_recycling: bool,
    /// Input channels bear the signal chain
    pub input_has_recycling: bool,
    /// One recycling shared per line (sync) vs per pad (async)
    pub sync: bool,
    pub r#async: bool,
    /// The node plays a notation timeline
    pub has_notation: bool,
    /// The node records/plays a wave timeline
    pub has_wave: bool,
}

/// Top-level graph node owning channels and recall templates
pub struct Audio {
    id: AudioId,
    name: String,
    presets: SoundcardPresets,
    flags: AudioFlags,
    audio_channels: usize,
    output_pads: usize,
    input_pads: usize,
    output: Vec<Channel>,
    input: Vec<Channel>,
    containers: Vec<RecallContainer>,
    recall_ids: Vec<Arc<RecallId>>,
    notations: Vec<Arc<Mutex<Notation>>>,
    waves: Vec<Arc<Mutex<Wave>>>,
    /// Steps before the sequencer wraps
    sequencer_length: u64,
    /// Guards the audio-level part of recall mapping
    mapped_recall: bool,
}

impl Audio {
    pub fn new(
        id: AudioId,
        name: impl Into<String>,
        presets: SoundcardPresets,
        flags: AudioFlags,
        audio_channels: usize,
        output_pads: usize,
        input_pads: usize,
        gc: &Handle,
    ) -> Self {
        let mut audio = Self {
            id,
            name: name.into(),
            presets,
            flags,
            audio_channels,
            output_pads: 0,
            input_pads: 0,
            output: Vec::new(),
            input: Vec::new(),
            containers: Vec::new(),
            recall_ids: Vec::new(),
            notations: Vec::new(),
            waves: Vec::new(),
            sequencer_length: 16,
            mapped_recall: false,
        };
        audio.resize_pads(ChannelKind::Output, output_pads, gc);
        audio.resize_pads(ChannelKind::Input, input_pads, gc);

        if flags.has_notation {
            audio.notations = (0..audio_channels)
                .map(|_| Arc::new(Mutex::new(Notation::new())))
                .collect();
        }
        if flags.has_wave {
            audio.waves = (0..audio_channels)
                .map(|_| {
                    Arc::new(Mutex::new(Wave::new(
                        presets.samplerate,
                        presets.buffer_size,
                        presets.format,
                    )))
                })
                .collect();
        }

        audio
    }

    pub fn id(&self) -> AudioId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> AudioFlags {
        self.flags
    }

    pub fn presets(&self) -> SoundcardPresets {
        self.presets
    }

    pub fn audio_channels(&self) -> usize {
        self.audio_channels
    }

    pub fn output_pads(&self) -> usize {
        self.output_pads
    }

    pub fn input_pads(&self) -> usize {
        self.input_pads
    }

    pub fn sequencer_length(&self) -> u64 {
        self.sequencer_length
    }

    pub fn set_sequencer_length(&mut self, length: u64) {
        self.sequencer_length = length.max(1);
    }

    fn lane(&self, kind: ChannelKind) -> &Vec<Channel> {
        match kind {
            ChannelKind::Output => &self.output,
            ChannelKind::Input => &self.input,
        }
    }

    fn lane_mut(&mut self, kind: ChannelKind) -> &mut Vec<Channel> {
        match kind {
            ChannelKind::Output => &mut self.output,
            ChannelKind::Input => &mut self.input,
        }
    }

    pub fn channels(&self, kind: ChannelKind) -> &[Channel] {
        self.lane(kind)
    }

    pub fn channels_mut(&mut self, kind: ChannelKind) -> &mut [Channel] {
        self.lane_mut(kind)
    }

    pub fn channel(&self, kind: ChannelKind, line: usize) -> Option<&Channel> {
        self.lane(kind).get(line)
    }

    pub fn channel_mut(&mut self, kind: ChannelKind, line: usize) -> Option<&mut Channel> {
        self.lane_mut(kind).get_mut(line)
    }

    fn pads(&self, kind: ChannelKind) -> usize {
        match kind {
            ChannelKind::Output => self.output_pads,
            ChannelKind::Input => self.input_pads,
        }
    }

    fn has_recycling(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Output => self.flags.output_has_recycling,
            ChannelKind::Input => self.flags.input_has_recycling,
        }
    }

    /// Grow or shrink one side's pad count
    ///
    /// Surviving channels keep their lines and recyclings; new channels
    /// get recyclings when the side bears the signal chain. Live voices
    /// are never touched - their contexts reference the old topology and
    /// drain naturally.
    pub fn resize_pads(&mut self, kind: ChannelKind, pads: usize, gc: &Handle) {
        let audio_id = self.id;
        let audio_channels = self.audio_channels;
        let presets = self.presets;
        let grow_recycling = self.has_recycling(kind);
        let lane = self.lane_mut(kind);

        let new_len = pads * audio_channels;
        if lane.len() > new_len {
            lane.truncate(new_len);
        } else {
            for line in lane.len()..new_len {
                let pad = line / audio_channels;
                let audio_channel = line % audio_channels;
                let mut channel =
                    Channel::new(ChannelId::new(audio_id, kind, line), pad, audio_channel);
                if grow_recycling {
                    channel.ensure_recycling(
                        presets.format,
                        presets.samplerate,
                        presets.buffer_size,
                        gc,
                    );
                }
                lane.push(channel);
            }
        }

        match kind {
            ChannelKind::Output => self.output_pads = pads,
            ChannelKind::Input => self.input_pads = pads,
        }
    }

    /// Change the audio channel count, renumbering every line
    ///
    /// Channels surviving at the same (pad, audio channel) coordinate
    /// keep their recycling and pattern; coordinates that appear are
    /// fresh channels.
    pub fn resize_audio_channels(&mut self, audio_channels: usize, gc: &Handle) {
        let audio_channels = audio_channels.max(1);
        if audio_channels == self.audio_channels {
            return;
        }
        let old_audio_channels = self.audio_channels;
        self.audio_channels = audio_channels;

        for kind in [ChannelKind::Output, ChannelKind::Input] {
            let audio_id = self.id;
            let presets = self.presets;
            let grow_recycling = self.has_recycling(kind);
            let pads = self.pads(kind);
            let lane = self.lane_mut(kind);

            let mut old: Vec<Option<Channel>> = std::mem::take(lane).into_iter().map(Some).collect();
            let mut rebuilt = Vec::with_capacity(pads * audio_channels);
            for line in 0..pads * audio_channels {
                let pad = line / audio_channels;
                let audio_channel = line % audio_channels;
                let id = ChannelId::new(audio_id, kind, line);

                let survivor = if audio_channel < old_audio_channels {
                    old.get_mut(pad * old_audio_channels + audio_channel)
                        .and_then(Option::take)
                } else {
                    None
                };

                let channel = match survivor {
                    Some(mut channel) => {
                        channel.renumber(id, pad, audio_channel);
                        channel
                    }
                    None => {
                        let mut channel = Channel::new(id, pad, audio_channel);
                        if grow_recycling {
                            channel.ensure_recycling(
                                presets.format,
                                presets.samplerate,
                                presets.buffer_size,
                                gc,
                            );
                        }
                        channel
                    }
                };
                rebuilt.push(channel);
            }
            *lane = rebuilt;
        }
    }

    // ── recall bookkeeping ──────────────────────────────────────────────

    pub fn containers(&self) -> &[RecallContainer] {
        &self.containers
    }

    pub fn container(&self, name: &str) -> Option<&RecallContainer> {
        self.containers.iter().find(|c| c.name() == name)
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut RecallContainer> {
        self.containers.iter_mut().find(|c| c.name() == name)
    }

    /// Container bound to a specific channel, by name prefix
    pub fn container_for_channel(
        &self,
        name: &str,
        channel: ChannelId,
    ) -> Option<&RecallContainer> {
        self.containers
            .iter()
            .find(|c| c.name() == name && c.channel() == Some(channel))
    }

    pub(crate) fn container_for_channel_mut(
        &mut self,
        name: &str,
        channel: ChannelId,
    ) -> Option<&mut RecallContainer> {
        self.containers
            .iter_mut()
            .find(|c| c.name() == name && c.channel() == Some(channel))
    }

    /// Allocate an empty container and hand it back for filling
    pub fn add_container(&mut self, name: impl Into<String>) -> &mut RecallContainer {
        let id = ContainerId(self.containers.len());
        self.containers.push(RecallContainer::new(id, name));
        self.containers.last_mut().expect("container just pushed")
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped_recall
    }

    pub(crate) fn set_mapped(&mut self) {
        self.mapped_recall = true;
    }

    // ── voices ──────────────────────────────────────────────────────────

    pub fn recall_ids(&self) -> &[Arc<RecallId>] {
        &self.recall_ids
    }

    pub fn attach_recall_id(&mut self, recall_id: Arc<RecallId>) {
        self.recall_ids.push(recall_id);
    }

    pub fn detach_recall_id(&mut self, recall_id: &Arc<RecallId>) {
        self.recall_ids.retain(|id| !Arc::ptr_eq(id, recall_id));
    }

    // ── timelines ───────────────────────────────────────────────────────

    pub fn notation(&self, audio_channel: usize) -> Option<&Arc<Mutex<Notation>>> {
        self.notations.get(audio_channel)
    }

    pub fn wave(&self, audio_channel: usize) -> Option<&Arc<Mutex<Wave>>> {
        self.waves.get(audio_channel)
    }
}

impl std::fmt::Debug for Audio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Audio")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("audio_channels", &self.audio_channels)
            .field("output_pads", &self.output_pads)
            .field("input_pads", &self.input_pads)
            .finish()
    }
}
