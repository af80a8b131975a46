//! Channel - one lane of an Audio

use std::sync::{Arc, Mutex};

use basedrop::Handle;

use super::Recycling;
use crate::timeline::Pattern;
use crate::types::{ChannelId, SampleFormat};

/// One audio port of an Audio node
///
/// A channel owns its recycling when it bears the signal chain (the
/// corresponding has-recycling flag on the audio is set); the recycling
/// is shared behind a lock because producing recalls attach signals to
/// it from the staged pass.
pub struct Channel {
    id: ChannelId,
    audio_channel: usize,
    pad: usize,
    link: Option<ChannelId>,
    recycling: Option<Arc<Mutex<Recycling>>>,
    pattern: Option<Arc<Mutex<Pattern>>>,
    /// Guards repeated recall mapping (mapping is idempotent)
    mapped_recall: bool,
}

impl Channel {
    pub fn new(id: ChannelId, pad: usize, audio_channel: usize) -> Self {
        Self {
            id,
            audio_channel,
            pad,
            link: None,
            recycling: None,
            pattern: None,
            mapped_recall: false,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Line index within the audio's channel array
    pub fn line(&self) -> usize {
        self.id.line
    }

    pub fn pad(&self) -> usize {
        self.pad
    }

    pub fn audio_channel(&self) -> usize {
        self.audio_channel
    }

    pub fn link(&self) -> Option<ChannelId> {
        self.link
    }

    pub(crate) fn set_link(&mut self, link: Option<ChannelId>) {
        self.link = link;
    }

    /// Allocate this channel's recycling if it has none yet
    pub fn ensure_recycling(
        &mut self,
        format: SampleFormat,
        samplerate: u32,
        buffer_size: usize,
        gc: &Handle,
    ) {
        if self.recycling.is_none() {
            self.recycling = Some(Arc::new(Mutex::new(Recycling::new(
                self.id,
                format,
                samplerate,
                buffer_size,
                gc,
            ))));
        }
    }

    pub fn recycling(&self) -> Option<&Arc<Mutex<Recycling>>> {
        self.recycling.as_ref()
    }

    pub fn pattern(&self) -> Option<&Arc<Mutex<Pattern>>> {
        self.pattern.as_ref()
    }

    pub fn set_pattern(&mut self, pattern: Pattern) {
        self.pattern = Some(Arc::new(Mutex::new(pattern)));
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped_recall
    }

    pub(crate) fn set_mapped(&mut self) {
        self.mapped_recall = true;
    }

    /// Rebind identity after an audio-channel resize renumbers lines
    pub(crate) fn renumber(&mut self, id: ChannelId, pad: usize, audio_channel: usize) {
        self.id = id;
        self.pad = pad;
        self.audio_channel = audio_channel;
        if let Some(recycling) = &self.recycling {
            recycling
                .lock()
                .expect("recycling lock poisoned")
                .set_channel(id);
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("link", &self.link)
            .field("has_recycling", &self.recycling.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc::GcService;
    use crate::types::{AudioId, ChannelKind};

    #[test]
    fn test_ensure_recycling_is_idempotent() {
        let gc = GcService::new();
        let id = ChannelId::new(AudioId(0), ChannelKind::Input, 0);
        let mut channel = Channel::new(id, 0, 0);
        assert!(channel.recycling().is_none());

        channel.ensure_recycling(SampleFormat::S16, 48000, 64, &gc.handle());
        let first = Arc::as_ptr(channel.recycling().unwrap());
        channel.ensure_recycling(SampleFormat::S16, 48000, 64, &gc.handle());
        assert_eq!(first, Arc::as_ptr(channel.recycling().unwrap()));
    }

    #[test]
    fn test_pattern_attachment() {
        let id = ChannelId::new(AudioId(0), ChannelKind::Input, 1);
        let mut channel = Channel::new(id, 0, 1);
        assert!(channel.pattern().is_none());

        channel.set_pattern(Pattern::new(1, 1, 16));
        assert!(channel.pattern().is_some());
    }
}
