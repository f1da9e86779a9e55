//! Device capture on a dedicated thread

use super::media::{SourceTap, TrackHandle};
use super::playout::AudioSink;
use super::sources::SourceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Which device a capture reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Input device by name, or the host default
    Input(Option<String>),

    /// Loopback of the default output device
    Loopback,
}

/// Commands sent to the audio thread
enum AudioCommand {
    Stop,
}

/// Live capture of one device.
///
/// `cpal::Stream` is not `Send`, so the stream lives on its own thread and
/// this handle only carries the command channel and join handle.
pub struct CaptureHandle {
    /// Command sender to control the audio thread
    command_tx: mpsc::Sender<AudioCommand>,

    /// Handle to the audio thread
    thread_handle: Option<JoinHandle<()>>,

    device_name: String,
}

impl CaptureHandle {
    /// Open `target` and start pushing mono samples into `tap`.
    ///
    /// Blocks until the device is open so failures surface here rather than
    /// on the audio thread.
    pub fn start(
        target: CaptureTarget,
        tap: Arc<SourceTap>,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self, SourceError> {
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || run_audio_thread(target, tap, sink, ready_tx, command_rx))
            .map_err(|e| SourceError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(device_name)) => Ok(Self {
                command_tx,
                thread_handle: Some(thread_handle),
                device_name,
            }),
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(SourceError::DeviceUnavailable(
                    "capture thread exited".to_string(),
                ))
            }
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stop the audio capture
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl TrackHandle for CaptureHandle {
    fn stop(&mut self) {
        CaptureHandle::stop(self);
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a stream build failure onto the source error taxonomy
fn classify(message: String) -> SourceError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        SourceError::PermissionDenied(message)
    } else {
        SourceError::DeviceUnavailable(message)
    }
}

fn find_device(target: &CaptureTarget) -> Result<(Device, bool), SourceError> {
    let host = cpal::default_host();

    match target {
        CaptureTarget::Loopback => {
            log::info!("Using default output device for loopback capture");
            host.default_output_device()
                .map(|d| (d, true))
                .ok_or_else(|| SourceError::DeviceUnavailable("no output device".to_string()))
        }
        CaptureTarget::Input(Some(name)) => host
            .input_devices()
            .map_err(|e| classify(e.to_string()))?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .map(|d| (d, false))
            .ok_or_else(|| SourceError::DeviceUnavailable(format!("input device '{}' not found", name))),
        CaptureTarget::Input(None) => host
            .default_input_device()
            .map(|d| (d, false))
            .ok_or_else(|| SourceError::DeviceUnavailable("no input device".to_string())),
    }
}

/// Run the audio capture in a dedicated thread
fn run_audio_thread(
    target: CaptureTarget,
    tap: Arc<SourceTap>,
    sink: Arc<dyn AudioSink>,
    ready_tx: mpsc::Sender<Result<String, SourceError>>,
    command_rx: mpsc::Receiver<AudioCommand>,
) {
    let stream = match open_stream(&target, tap, sink) {
        Ok((stream, name)) => {
            let _ = ready_tx.send(Ok(name));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    log::info!("Audio capture started");

    match command_rx.recv() {
        Ok(AudioCommand::Stop) => log::info!("Audio capture stopping"),
        Err(_) => log::info!("Audio capture channel disconnected"),
    }
    drop(stream);
}

fn open_stream(
    target: &CaptureTarget,
    tap: Arc<SourceTap>,
    sink: Arc<dyn AudioSink>,
) -> Result<(cpal::Stream, String), SourceError> {
    let (device, is_loopback) = find_device(target)?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    // For loopback, the output config is what the device is producing
    let config = if is_loopback {
        device
            .default_output_config()
            .map_err(|e| classify(format!("Loopback config: {}", e)))?
    } else {
        device
            .default_input_config()
            .map_err(|e| classify(e.to_string()))?
    };

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    tap.set_sample_rate(sample_rate);

    log::info!(
        "Audio capture: {} ({} Hz, {} channels)",
        name,
        sample_rate,
        channels
    );

    let stream_config: StreamConfig = config.clone().into();
    let stream = match config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, tap, sink, channels),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, tap, sink, channels),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, tap, sink, channels),
        _ => {
            return Err(SourceError::DeviceUnavailable(
                "Unsupported sample format".to_string(),
            ))
        }
    }
    .map_err(|e| classify(e.to_string()))?;

    stream.play().map_err(|e| classify(e.to_string()))?;

    Ok((stream, name))
}

/// Build audio stream for given sample type
fn build_stream<T: cpal::Sample + cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    tap: Arc<SourceTap>,
    sink: Arc<dyn AudioSink>,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    f32: cpal::FromSample<T>,
{
    let sample_rate = config.sample_rate.0;
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mono: Vec<f32> = data
                .chunks(channels.max(1))
                .map(|frame| {
                    let sum: f32 = frame
                        .iter()
                        .map(|s| -> f32 { cpal::Sample::from_sample(*s) })
                        .sum();
                    sum / frame.len() as f32
                })
                .collect();

            tap.push(&mono);

            // Monitoring: only audible when the graph routed this source to
            // the monitor node.
            let gain = tap.audible_gain();
            if gain > 0.0 {
                let scaled: Vec<f32> = mono.iter().map(|s| s * gain).collect();
                sink.write(&scaled, sample_rate);
            }
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )
}
