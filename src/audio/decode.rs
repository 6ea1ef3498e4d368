use std::path::{Path, PathBuf};
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use thiserror::Error;

/// File extensions the player accepts. Formats outside this list are
/// rejected before probing.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "mpeg", "wav", "m4a", "wma", "aac", "flac", "ogg", "aiff",
];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(PathBuf),
    #[error("failed to probe audio format: {0}")]
    Probe(SymphoniaError),
    #[error("no decodable audio track found")]
    NoTrack,
    #[error("track reports no sample rate")]
    UnknownSampleRate,
    #[error("failed to create decoder: {0}")]
    Codec(SymphoniaError),
}

/// Basic stream properties reported once a source is opened.
#[derive(Clone, Copy, Debug)]
pub struct SourceInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub duration: Duration,
}

/// A decodable audio file opened for seek-and-read access.
///
/// Holds the demuxer and decoder for exactly one file. Opening errors are
/// typed; once open, reads never fail: any mid-stream problem (EOF, seek
/// past end, corrupt packet) degrades to zero-filled silence so a spectrum
/// tick can never stall playback.
pub struct AudioSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration: Duration,
}

impl std::fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSource")
            .field("track_id", &self.track_id)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl AudioSource {
    pub fn open(path: &Path) -> Result<AudioSource, DecodeError> {
        if !is_supported_extension(path) {
            return Err(DecodeError::UnsupportedExtension(path.to_path_buf()));
        }

        let file = std::fs::File::open(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(DecodeError::Probe)?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;

        let track_id = track.id;
        let channels = track.codec_params.channels.map_or(1, |c| c.count());
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(DecodeError::UnknownSampleRate)?;

        let duration = match track.codec_params.n_frames {
            Some(frames) => Duration::from_secs_f64(frames as f64 / sample_rate as f64),
            None => {
                log::warn!("{}: track reports no frame count", path.display());
                Duration::ZERO
            }
        };

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(DecodeError::Codec)?;

        log::info!(
            "Opened {}: {}Hz, {} channel(s), {:.1}s",
            path.display(),
            sample_rate,
            channels,
            duration.as_secs_f64()
        );

        Ok(AudioSource {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration,
        })
    }

    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            sample_rate: self.sample_rate,
            channels: self.channels,
            duration: self.duration,
        }
    }

    /// Seek to `position` and read up to `buffer_size` mono samples.
    ///
    /// The returned buffer is always exactly `buffer_size` long; whatever
    /// could not be decoded (end of file, seek failure, corrupt packets) is
    /// left as zeros.
    pub fn read_chunk_at(&mut self, position: Duration, buffer_size: usize) -> Vec<f32> {
        let mut chunk = vec![0.0f32; buffer_size];

        let seek_to = SeekTo::Time {
            time: Time::from(position.as_secs_f64()),
            track_id: Some(self.track_id),
        };
        let required_ts = match self.format.seek(SeekMode::Accurate, seek_to) {
            Ok(seeked) => seeked.required_ts,
            Err(err) => {
                log::debug!(
                    "Seek to {:.2}s failed, returning silence: {}",
                    position.as_secs_f64(),
                    err
                );
                return chunk;
            }
        };
        self.decoder.reset();

        let mut filled = 0usize;

        while filled < buffer_size {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(err) => {
                    log::debug!("Read error, truncating chunk to silence: {}", err);
                    break;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let packet_ts = packet.ts();

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(err) => {
                    log::debug!("Decode error, truncating chunk to silence: {}", err);
                    break;
                }
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();

            let mut sample_buf = SampleBuffer::<f32>::new(frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            let channels = spec.channels.count().max(1);

            // Accurate seek lands on the packet at or before the requested
            // time; trim leading frames up to the required timestamp.
            let skip = required_ts.saturating_sub(packet_ts).min(frames as u64) as usize;

            // Downmix to mono
            for frame in sample_buf.samples().chunks_exact(channels).skip(skip) {
                if filled >= buffer_size {
                    break;
                }
                chunk[filled] = frame.iter().sum::<f32>() / channels as f32;
                filled += 1;
            }
        }

        let non_zero = chunk.iter().filter(|s| s.abs() > 0.001).count();
        log::debug!(
            "Samples read: {}/{}, non-zero: {}, position: {:.2}s",
            filled,
            buffer_size,
            non_zero,
            position.as_secs_f64()
        );

        chunk
    }
}

/// Cheap path validation for the file picker: existing file with a
/// supported extension.
pub fn is_valid_audio_file(path: &Path) -> bool {
    path.is_file() && is_supported_extension(path)
}

fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|s| *s == ext)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a mono sine-wave WAV to a temp path and return it.
    fn write_sine_wav(name: &str, freq_hz: f32, seconds: f32) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let sample_rate = 44100u32;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        let total = (seconds * sample_rate as f32) as usize;
        for i in 0..total {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * freq_hz * t).sin();
            writer
                .write_sample((sample * i16::MAX as f32 * 0.8) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn open_reports_stream_properties() {
        let path = write_sine_wav("spectro_props.wav", 440.0, 2.0);
        let source = AudioSource::open(&path).unwrap();
        let info = source.info();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 1);
        assert!((info.duration.as_secs_f64() - 2.0).abs() < 0.05);
    }

    #[test]
    fn open_rejects_missing_file() {
        let err = AudioSource::open(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }

    #[test]
    fn open_rejects_unsupported_extension() {
        let err = AudioSource::open(Path::new("/tmp/notes.txt")).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedExtension(_)));
    }

    #[test]
    fn read_returns_exact_buffer_size() {
        let path = write_sine_wav("spectro_exact.wav", 440.0, 1.0);
        let mut source = AudioSource::open(&path).unwrap();
        let chunk = source.read_chunk_at(Duration::from_millis(100), 1024);
        assert_eq!(chunk.len(), 1024);
        assert!(chunk.iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn read_near_eof_zero_fills_tail() {
        // 0.5s file, read at 0.49s: ~441 real samples, rest must be zero.
        let path = write_sine_wav("spectro_tail.wav", 440.0, 0.5);
        let mut source = AudioSource::open(&path).unwrap();
        let chunk = source.read_chunk_at(Duration::from_millis(490), 1024);
        assert_eq!(chunk.len(), 1024);
        assert!(chunk[..256].iter().any(|s| s.abs() > 0.01));
        assert!(chunk[512..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn read_past_eof_is_silence() {
        let path = write_sine_wav("spectro_eof.wav", 440.0, 0.5);
        let mut source = AudioSource::open(&path).unwrap();
        let chunk = source.read_chunk_at(Duration::from_secs(10), 1024);
        assert_eq!(chunk.len(), 1024);
        assert!(chunk.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn seeking_backward_works() {
        let path = write_sine_wav("spectro_backward.wav", 440.0, 2.0);
        let mut source = AudioSource::open(&path).unwrap();
        let late = source.read_chunk_at(Duration::from_millis(1500), 1024);
        let early = source.read_chunk_at(Duration::from_millis(100), 1024);
        assert!(late.iter().any(|s| s.abs() > 0.1));
        assert!(early.iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn samples_are_in_unit_range() {
        let path = write_sine_wav("spectro_range.wav", 440.0, 1.0);
        let mut source = AudioSource::open(&path).unwrap();
        let chunk = source.read_chunk_at(Duration::from_millis(200), 2048);
        assert!(chunk.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn validates_extension_case_insensitively() {
        assert!(is_supported_extension(Path::new("song.MP3")));
        assert!(is_supported_extension(Path::new("song.flac")));
        assert!(!is_supported_extension(Path::new("song.pdf")));
        assert!(!is_supported_extension(Path::new("song")));
    }
}
