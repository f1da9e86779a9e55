//! Source requests, source errors and device enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A request to switch the analysed signal to a new source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum SourceRequest {
    /// Local audio file, played through the output
    FileTrack { path: PathBuf },

    /// Input device; `None` picks the host default
    Microphone { device_id: Option<String> },

    /// System output captured through loopback
    DisplayCapture,

    /// HTTP(S) audio stream, played through the output
    LiveStream { url: String },
}

impl SourceRequest {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::FileTrack { .. } => SourceKind::FileTrack,
            Self::Microphone { .. } => SourceKind::Microphone,
            Self::DisplayCapture => SourceKind::DisplayCapture,
            Self::LiveStream { .. } => SourceKind::LiveStream,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::FileTrack { path } => format!("file {}", path.display()),
            Self::Microphone { device_id: Some(id) } => format!("microphone '{id}'"),
            Self::Microphone { device_id: None } => "default microphone".to_string(),
            Self::DisplayCapture => "display capture".to_string(),
            Self::LiveStream { url } => format!("stream {url}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    FileTrack,
    Microphone,
    DisplayCapture,
    LiveStream,
}

impl SourceKind {
    /// Backed by live device or display audio rather than a file or URL
    pub fn is_capture(self) -> bool {
        matches!(self, Self::Microphone | Self::DisplayCapture)
    }

    /// Routed to the volume node on activation
    pub fn is_audible(self) -> bool {
        !self.is_capture()
    }
}

/// Audio source errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Source provided no audio track")]
    NoAudioTrack,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Audio source information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSource {
    /// Identifier accepted by `SourceRequest::Microphone`
    pub id: String,

    /// Display name
    pub name: String,

    /// Source type
    pub source_type: SourceType,
}

/// Type of audio source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// System-wide audio (loopback)
    SystemAudio,

    /// Input device (microphone)
    InputDevice,
}

/// List capture-capable devices on the default host
pub fn list_sources() -> Result<Vec<AudioSource>, SourceError> {
    let mut sources = Vec::new();

    let host = cpal::default_host();

    if let Some(device) = host.default_output_device() {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        sources.push(AudioSource {
            id: "display".to_string(),
            name: format!("Display capture ({})", device_name),
            source_type: SourceType::SystemAudio,
        });
    }

    let devices = host
        .input_devices()
        .map_err(|e| SourceError::DeviceUnavailable(e.to_string()))?;
    for device in devices {
        if let Ok(name) = device.name() {
            sources.push(AudioSource {
                id: name.clone(),
                name: format!("Input: {}", name),
                source_type: SourceType::InputDevice,
            });
        }
    }

    Ok(sources)
}
