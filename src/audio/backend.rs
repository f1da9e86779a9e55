//! Media backend over real devices: cpal capture, symphonia decoding and
//! HTTP streams

use super::capture::{CaptureHandle, CaptureTarget};
use super::decode::StreamDecoder;
use super::media::{
    MediaBackend, MediaStream, MediaTrack, PlaybackControl, SourceTap, TrackHandle, TrackKind,
};
use super::playout::{AudioSink, Playout};
use super::sources::{SourceError, SourceRequest};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Decoded audio running this far ahead of the wall clock is held back
const MAX_LEAD: Duration = Duration::from_millis(50);

type Reopen = Box<dyn FnMut() -> Result<StreamDecoder, SourceError> + Send>;

pub struct CpalBackend {
    sink: Arc<dyn AudioSink>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(Playout::new()))
    }

    pub fn with_sink(sink: Arc<dyn AudioSink>) -> Self {
        Self { sink }
    }

    fn open_capture(
        &self,
        target: CaptureTarget,
        tap: Arc<SourceTap>,
    ) -> Result<MediaTrack, SourceError> {
        let handle = CaptureHandle::start(target, tap, self.sink.clone())?;
        let label = handle.device_name().to_string();
        Ok(MediaTrack::new(TrackKind::Audio, label, Box::new(handle)))
    }

    fn open_file(&self, path: &Path, tap: Arc<SourceTap>) -> Result<MediaStream, SourceError> {
        let decoder = StreamDecoder::open_file(path)?;
        let reopen_path = path.to_path_buf();
        let reopen: Reopen = Box::new(move || StreamDecoder::open_file(&reopen_path));
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.spawn_player(label, decoder, Some(reopen), tap)
    }

    fn open_live(&self, url: &str, tap: Arc<SourceTap>) -> Result<MediaStream, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| SourceError::DeviceUnavailable(e.to_string()))?;

        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| SourceError::DeviceUnavailable(format!("{}: {}", url, e)))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let extension = extension_for_content_type(&content_type).or_else(|| extension_for_url(url));
        log::info!("Live stream connected: {} ({})", url, content_type);

        let decoder = StreamDecoder::open_reader(response, extension)?;
        self.spawn_player(url.to_string(), decoder, None, tap)
    }

    fn spawn_player(
        &self,
        label: String,
        decoder: StreamDecoder,
        reopen: Option<Reopen>,
        tap: Arc<SourceTap>,
    ) -> Result<MediaStream, SourceError> {
        let control = Arc::new(PlaybackControl::default());
        let stop = Arc::new(AtomicBool::new(false));
        tap.set_sample_rate(decoder.sample_rate());

        let player = Player {
            decoder,
            reopen,
            tap,
            sink: self.sink.clone(),
            control: control.clone(),
            stop: stop.clone(),
        };

        let thread_handle = thread::Builder::new()
            .name("audio-player".to_string())
            .spawn(move || player.run())
            .map_err(|e| SourceError::DeviceUnavailable(e.to_string()))?;

        let handle = PlayerHandle {
            stop,
            thread_handle: Some(thread_handle),
        };
        let track = MediaTrack::new(TrackKind::Audio, label, Box::new(handle));
        Ok(MediaStream::new(vec![track]).with_control(control))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaBackend for CpalBackend {
    fn open(
        &mut self,
        request: &SourceRequest,
        tap: Arc<SourceTap>,
    ) -> Result<MediaStream, SourceError> {
        match request {
            SourceRequest::Microphone { device_id } => {
                let track = self.open_capture(CaptureTarget::Input(device_id.clone()), tap)?;
                Ok(MediaStream::new(vec![track]))
            }
            SourceRequest::DisplayCapture => {
                match self.open_capture(CaptureTarget::Loopback, tap) {
                    Ok(track) => Ok(MediaStream::new(vec![track])),
                    Err(SourceError::PermissionDenied(msg)) => {
                        Err(SourceError::PermissionDenied(msg))
                    }
                    // No loopback on this platform: the capture carries no audio.
                    Err(e) => {
                        log::warn!("Display capture has no audio: {}", e);
                        Ok(MediaStream::new(Vec::new()))
                    }
                }
            }
            SourceRequest::FileTrack { path } => self.open_file(path, tap),
            SourceRequest::LiveStream { url } => self.open_live(url, tap),
        }
    }
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/aac" | "audio/aacp" => Some("aac"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/flac" => Some("flac"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        _ => None,
    }
}

fn extension_for_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
    match ext.as_str() {
        "mp3" => Some("mp3"),
        "aac" => Some("aac"),
        "ogg" | "oga" => Some("ogg"),
        "flac" => Some("flac"),
        "wav" => Some("wav"),
        _ => None,
    }
}

struct PlayerHandle {
    stop: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TrackHandle for PlayerHandle {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        TrackHandle::stop(self);
    }
}

/// Decodes on its own thread and releases samples at playback speed
struct Player {
    decoder: StreamDecoder,
    reopen: Option<Reopen>,
    tap: Arc<SourceTap>,
    sink: Arc<dyn AudioSink>,
    control: Arc<PlaybackControl>,
    stop: Arc<AtomicBool>,
}

impl Player {
    fn run(mut self) {
        let rate = self.decoder.sample_rate().max(1) as f64;
        let mut anchor: Option<Instant> = None;
        let mut emitted: u64 = 0;

        while !self.stop.load(Ordering::Relaxed) {
            if self.control.take_rewind() {
                self.rewind();
                anchor = None;
                emitted = 0;
            }

            if self.control.is_paused() {
                if anchor.is_some() {
                    self.tap.clear();
                }
                anchor = None;
                emitted = 0;
                thread::sleep(Duration::from_millis(10));
                continue;
            }

            let started = *anchor.get_or_insert_with(Instant::now);
            let played = Duration::from_secs_f64(emitted as f64 / rate);
            let elapsed = started.elapsed();
            if played > elapsed + MAX_LEAD {
                thread::sleep((played - elapsed - MAX_LEAD).min(Duration::from_millis(20)));
                continue;
            }

            match self.decoder.next_chunk() {
                Ok(Some(chunk)) => {
                    emitted += chunk.len() as u64;
                    self.tap.push(&chunk);
                    let gain = self.tap.audible_gain();
                    if gain > 0.0 {
                        let scaled: Vec<f32> = chunk.iter().map(|s| s * gain).collect();
                        self.sink.write(&scaled, self.decoder.sample_rate());
                    }
                }
                Ok(None) => {
                    log::info!("Playback reached end of stream");
                    if self.reopen.is_none() {
                        self.control.pause();
                        self.tap.clear();
                        break;
                    }
                    // Playing again starts over from the top
                    self.control.stop();
                }
                Err(e) => {
                    log::warn!("Playback stopped: {}", e);
                    self.control.pause();
                    self.tap.clear();
                    break;
                }
            }
        }
    }

    fn rewind(&mut self) {
        let Some(reopen) = self.reopen.as_mut() else {
            return;
        };
        match reopen() {
            Ok(decoder) => self.decoder = decoder,
            Err(e) => log::warn!("Rewind failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_format_comes_from_content_type_first() {
        assert_eq!(extension_for_content_type("audio/mpeg"), Some("mp3"));
        assert_eq!(extension_for_content_type("audio/aacp; charset=x"), Some("aac"));
        assert_eq!(extension_for_content_type("text/html"), None);
    }

    #[test]
    fn stream_format_falls_back_to_url_extension() {
        assert_eq!(extension_for_url("https://radio.example/live.ogg?sid=1"), Some("ogg"));
        assert_eq!(extension_for_url("https://radio.example/live"), None);
    }
}
