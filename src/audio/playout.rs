//! Audible output path shared by file playback and capture monitoring

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Destination for samples that should be heard
pub trait AudioSink: Send + Sync {
    /// Queue mono samples recorded at `sample_rate`
    fn write(&self, samples: &[f32], sample_rate: u32);
}

/// Discards everything. Used when no output device is wanted.
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&self, _samples: &[f32], _sample_rate: u32) {}
}

enum OutputState {
    Idle,
    Running {
        command_tx: mpsc::Sender<()>,
        thread_handle: Option<JoinHandle<()>>,
        device_rate: u32,
    },
    Failed,
}

/// Default output device, opened on first write.
///
/// `cpal::Stream` is not `Send`, so a dedicated thread owns it and drains a
/// shared queue; writers only touch the queue.
pub struct Playout {
    queue: Arc<Mutex<VecDeque<f32>>>,
    state: Mutex<OutputState>,
}

impl Playout {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            state: Mutex::new(OutputState::Idle),
        }
    }

    fn ensure_started(&self) -> Option<u32> {
        let mut state = self.state.lock();
        match &*state {
            OutputState::Running { device_rate, .. } => return Some(*device_rate),
            OutputState::Failed => return None,
            OutputState::Idle => {}
        }

        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let queue = self.queue.clone();

        let spawned = thread::Builder::new()
            .name("audio-playout".to_string())
            .spawn(move || run_output_thread(queue, ready_tx, command_rx));

        let thread_handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Playout thread failed to start: {}", e);
                *state = OutputState::Failed;
                return None;
            }
        };

        match ready_rx.recv() {
            Ok(Ok(device_rate)) => {
                log::info!("Audio output started at {} Hz", device_rate);
                *state = OutputState::Running {
                    command_tx,
                    thread_handle: Some(thread_handle),
                    device_rate,
                };
                Some(device_rate)
            }
            Ok(Err(e)) => {
                log::warn!("Audio output unavailable, continuing silently: {}", e);
                let _ = thread_handle.join();
                *state = OutputState::Failed;
                None
            }
            Err(_) => {
                log::warn!("Audio output thread exited before reporting");
                let _ = thread_handle.join();
                *state = OutputState::Failed;
                None
            }
        }
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let OutputState::Running {
            command_tx,
            thread_handle,
            ..
        } = &mut *state
        {
            let _ = command_tx.send(());
            if let Some(handle) = thread_handle.take() {
                let _ = handle.join();
            }
        }
        *state = OutputState::Idle;
        self.queue.lock().clear();
    }
}

impl Default for Playout {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for Playout {
    fn write(&self, samples: &[f32], sample_rate: u32) {
        let Some(device_rate) = self.ensure_started() else {
            return;
        };
        let resampled = resample_linear(samples, sample_rate, device_rate);

        let mut queue = self.queue.lock();
        queue.extend(resampled);
        // Half a second of backlog at most; older audio is dropped.
        let limit = device_rate as usize / 2;
        if queue.len() > limit {
            let excess = queue.len() - limit;
            queue.drain(..excess);
        }
    }
}

impl Drop for Playout {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Linear interpolation between two sample rates
pub(crate) fn resample_linear(input: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || to == 0 || input.is_empty() {
        return input.to_vec();
    }
    let ratio = from as f64 / to as f64;
    let out_len = ((input.len() as f64) / ratio).round() as usize;
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            input[idx] + (input[next] - input[idx]) * frac
        })
        .collect()
}

fn run_output_thread(
    queue: Arc<Mutex<VecDeque<f32>>>,
    ready_tx: mpsc::Sender<Result<u32, String>>,
    command_rx: mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        let _ = ready_tx.send(Err("no output device".to_string()));
        return;
    };
    let config = match device.default_output_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };

    let device_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let stream_config: StreamConfig = config.clone().into();

    let stream = match config.sample_format() {
        SampleFormat::F32 => build_output::<f32>(&device, &stream_config, queue, channels),
        SampleFormat::I16 => build_output::<i16>(&device, &stream_config, queue, channels),
        SampleFormat::U16 => build_output::<u16>(&device, &stream_config, queue, channels),
        other => {
            let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
            return;
        }
    };
    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.to_string()));
        return;
    }

    let _ = ready_tx.send(Ok(device_rate));

    // Block until asked to stop or the owner goes away.
    let _ = command_rx.recv();
    log::info!("Audio output stopping");
}

fn build_output<T>(
    device: &Device,
    config: &StreamConfig,
    queue: Arc<Mutex<VecDeque<f32>>>,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut queue = queue.lock();
            for frame in data.chunks_mut(channels.max(1)) {
                let value: T = cpal::Sample::from_sample(queue.pop_front().unwrap_or(0.0));
                for out in frame.iter_mut() {
                    *out = value;
                }
            }
        },
        |err| {
            log::error!("Audio output error: {}", err);
        },
        None,
    )
}
