//! Scripted media backend for tests

use super::media::{
    MediaBackend, MediaStream, MediaTrack, PlaybackControl, SourceTap, TrackHandle, TrackKind,
};
use super::sources::{SourceError, SourceRequest};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) enum Outcome {
    Tracks { audio: usize, video: usize },
    Fail(SourceError),
}

#[derive(Default)]
pub(crate) struct BackendLog {
    pub opened: Vec<SourceRequest>,
    pub released: Vec<String>,
    pub taps: Vec<Arc<SourceTap>>,
    pub controls: Vec<Arc<PlaybackControl>>,
    /// `open:<n>` and `release:<label>` in the order they happened
    pub events: Vec<String>,
    pub script: VecDeque<Outcome>,
}

/// Opens one audio track per request unless an outcome is scripted
#[derive(Clone, Default)]
pub(crate) struct ScriptedBackend {
    pub log: Arc<Mutex<BackendLog>>,
}

impl ScriptedBackend {
    pub fn push(&self, outcome: Outcome) {
        self.log.lock().script.push_back(outcome);
    }

    pub fn released(&self) -> Vec<String> {
        self.log.lock().released.clone()
    }

    pub fn last_tap(&self) -> Option<Arc<SourceTap>> {
        self.log.lock().taps.last().cloned()
    }

    pub fn last_control(&self) -> Option<Arc<PlaybackControl>> {
        self.log.lock().controls.last().cloned()
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().events.clone()
    }
}

struct RecordingHandle {
    label: String,
    log: Arc<Mutex<BackendLog>>,
}

impl TrackHandle for RecordingHandle {
    fn stop(&mut self) {
        let mut log = self.log.lock();
        log.released.push(self.label.clone());
        log.events.push(format!("release:{}", self.label));
    }
}

impl MediaBackend for ScriptedBackend {
    fn open(
        &mut self,
        request: &SourceRequest,
        tap: Arc<SourceTap>,
    ) -> Result<MediaStream, SourceError> {
        let (outcome, index) = {
            let mut log = self.log.lock();
            log.opened.push(request.clone());
            let opened = log.opened.len();
            log.events.push(format!("open:{opened}"));
            let outcome = log
                .script
                .pop_front()
                .unwrap_or(Outcome::Tracks { audio: 1, video: 0 });
            (outcome, opened)
        };

        let (audio, video) = match outcome {
            Outcome::Fail(e) => return Err(e),
            Outcome::Tracks { audio, video } => (audio, video),
        };

        self.log.lock().taps.push(tap);

        let mut tracks = Vec::new();
        for (kind, count, name) in [(TrackKind::Audio, audio, "audio"), (TrackKind::Video, video, "video")] {
            for _ in 0..count {
                let label = format!("{name}{index}");
                let handle = RecordingHandle {
                    label: label.clone(),
                    log: self.log.clone(),
                };
                tracks.push(MediaTrack::new(kind, label, Box::new(handle)));
            }
        }
        let stream = MediaStream::new(tracks);
        // Decoded sources carry a transport, like the real player
        if request.kind().is_audible() {
            let control = Arc::new(PlaybackControl::default());
            self.log.lock().controls.push(control.clone());
            return Ok(stream.with_control(control));
        }
        Ok(stream)
    }
}
