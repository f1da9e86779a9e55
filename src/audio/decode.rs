//! Incremental decoding of files and network streams to mono f32

use super::sources::SourceError;
use parking_lot::Mutex;
use std::io::Read;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Packet-by-packet decoder over any symphonia media source
pub struct StreamDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
}

impl StreamDecoder {
    pub fn open_file(path: &Path) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path).map_err(|e| {
            SourceError::DeviceUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let extension = path.extension().and_then(|e| e.to_str());
        Self::open(Box::new(file), extension)
    }

    /// Wrap a forward-only reader such as an HTTP body
    pub fn open_reader<R: Read + Send + 'static>(
        reader: R,
        extension: Option<&str>,
    ) -> Result<Self, SourceError> {
        let source = ReadOnlySource::new(SyncReader(Mutex::new(reader)));
        Self::open(Box::new(source), extension)
    }

    pub fn open(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self, SourceError> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| SourceError::DeviceUnavailable(format!("unrecognised audio format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(SourceError::NoAudioTrack)?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| SourceError::DeviceUnavailable("unknown sample rate".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SourceError::DeviceUnavailable(format!("no decoder: {}", e)))?;

        log::debug!("Decoder opened: track {} at {} Hz", track_id, sample_rate);

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Next packet downmixed to mono, `None` at end of stream
    pub fn next_chunk(&mut self) -> Result<Option<Vec<f32>>, SourceError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(SourceError::DeviceUnavailable(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(SourceError::DeviceUnavailable(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(downmix(sample_buf.samples(), channels)));
        }
    }
}

/// Average interleaved frames down to one channel
pub(crate) fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// `MediaSource` requires `Sync`; readers such as HTTP bodies are only `Send`.
struct SyncReader<R>(Mutex<R>);

impl<R: Read> Read for SyncReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.get_mut().read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.25], 1), vec![0.25]);
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        let frames: Vec<i16> = (0..400).flat_map(|_| [16384i16, 0]).collect();
        let bytes = wav_bytes(&frames, 22_050, 2);

        let mut decoder = StreamDecoder::open_reader(Cursor::new(bytes), Some("wav")).unwrap();
        assert_eq!(decoder.sample_rate(), 22_050);

        let mut total = Vec::new();
        while let Some(chunk) = decoder.next_chunk().unwrap() {
            total.extend(chunk);
        }
        assert_eq!(total.len(), 400);
        assert!((total[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn garbage_input_is_rejected() {
        let result = StreamDecoder::open_reader(Cursor::new(vec![7u8; 64]), None);
        assert!(matches!(result, Err(SourceError::DeviceUnavailable(_))));
    }
}
