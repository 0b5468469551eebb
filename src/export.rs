//! PCM export: float buffers to interleaved 16-bit samples and WAV bytes.

use std::io::{Cursor, Read};
use std::path::Path;

use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::error::{Result, TechnoError};

/// Full-scale value of a 16-bit sample.
pub const I16_SCALE: f64 = 32767.0;

/// Interleave the channels and convert to i16, clamping to `[-1, 1]` first.
pub fn to_pcm_i16(buffer: &AudioBuffer) -> Vec<i16> {
    let channels = buffer.channels();
    let mut pcm = Vec::with_capacity(buffer.len() * channels.len());
    for i in 0..buffer.len() {
        for ch in channels {
            pcm.push(sample_to_i16(ch[i]));
        }
    }
    pcm
}

#[inline]
fn sample_to_i16(sample: f64) -> i16 {
    // NaN maps to silence.
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    (s * I16_SCALE).round() as i16
}

fn pcm16_spec(sample_rate: u32, channels: u16) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode a buffer as a 16-bit PCM WAV file in memory.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let pcm = to_pcm_i16(buffer);
    encode_pcm_wav(&pcm, buffer.sample_rate(), buffer.num_channels() as u16)
}

/// Encode interleaved i16 samples as WAV bytes.
///
/// Mono and stereo get the plain 44-byte PCM header.
pub fn encode_pcm_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), pcm16_spec(sample_rate, channels))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(bytes)
}

/// Write a 16-bit PCM WAV file.
pub fn write_wav(buffer: &AudioBuffer, path: impl AsRef<Path>) -> Result<()> {
    let spec = pcm16_spec(buffer.sample_rate(), buffer.num_channels() as u16);
    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for sample in to_pcm_i16(buffer) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    debug!(path = %path.as_ref().display(), frames = buffer.len(), "wav written");
    Ok(())
}

/// Read a mono or stereo WAV back into a buffer.
///
/// 16-bit files are scaled by 1/32767, the inverse of [`write_wav`].
pub fn read_wav(path: impl AsRef<Path>) -> Result<AudioBuffer> {
    decode(hound::WavReader::open(path.as_ref())?)
}

/// Decode WAV bytes produced by [`encode_wav`] or any mono/stereo encoder.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    decode(hound::WavReader::new(Cursor::new(bytes))?)
}

fn decode<R: Read>(reader: hound::WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if !(1..=2).contains(&channels) {
        return Err(TechnoError::invalid("channels", channels as f64, "1 or 2 channels"));
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = if spec.bits_per_sample == 16 {
                I16_SCALE
            } else {
                (1_i64 << (spec.bits_per_sample - 1)) as f64
            };
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_val))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let mut split = vec![Vec::with_capacity(interleaved.len() / channels); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (dst, &s) in split.iter_mut().zip(frame) {
            dst.push(s);
        }
    }
    let mut split = split.into_iter();
    match (split.next(), split.next()) {
        (Some(left), Some(right)) => AudioBuffer::stereo(left, right, spec.sample_rate),
        (Some(mono), None) => AudioBuffer::mono(mono, spec.sample_rate),
        _ => Err(TechnoError::invalid("channels", 0.0, "1 or 2 channels")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_scales_and_clamps() {
        let buf = AudioBuffer::mono(vec![0.0, 1.0, -1.0, 0.5, 2.0, -3.0, f64::NAN], 44100).unwrap();
        assert_eq!(to_pcm_i16(&buf), vec![0, 32767, -32767, 16384, 32767, -32767, 0]);
    }

    #[test]
    fn pcm_interleaves_stereo() {
        let buf = AudioBuffer::stereo(vec![1.0, 0.0], vec![-1.0, 0.5], 44100).unwrap();
        assert_eq!(to_pcm_i16(&buf), vec![32767, -32767, 0, 16384]);
    }

    #[test]
    fn wav_header_valid() {
        let buf = AudioBuffer::silent(10, 2, 48000).unwrap();
        let wav = encode_wav(&buf).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 48000);
        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 2);
    }

    #[test]
    fn wav_size_correct() {
        let buf = AudioBuffer::silent(22050, 1, 44100).unwrap();
        let wav = encode_wav(&buf).unwrap();
        // 22050 frames * 1 channel * 2 bytes
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 44100);
        assert_eq!(wav.len(), 44 + 44100);
        let riff_size = u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]);
        assert_eq!(riff_size as usize, wav.len() - 8);
    }

    #[test]
    fn wav_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hit.wav");
        let buf = AudioBuffer::stereo(vec![0.5, -0.25, 1.0], vec![0.0, 0.75, -1.0], 44100).unwrap();
        write_wav(&buf, &path).unwrap();

        let back = read_wav(&path).unwrap();
        assert_eq!(back.sample_rate(), 44100);
        assert!(back.is_stereo());
        assert_eq!(back.len(), 3);
        for (a, b) in buf.channels().iter().flatten().zip(back.channels().iter().flatten()) {
            assert!((a - b).abs() <= 1.0 / I16_SCALE, "{a} came back as {b}");
        }
    }

    #[test]
    fn encoded_bytes_decode_back() {
        let buf = AudioBuffer::mono(vec![0.25, -0.5, 0.0, 1.0], 22050).unwrap();
        let back = decode_wav(&encode_wav(&buf).unwrap()).unwrap();
        assert_eq!(back.sample_rate(), 22050);
        assert!(!back.is_stereo());
        for (a, b) in buf.channel(0).unwrap().iter().zip(back.channel(0).unwrap()) {
            assert!((a - b).abs() <= 1.0 / I16_SCALE, "{a} came back as {b}");
        }
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(matches!(decode_wav(b"not a wav file"), Err(TechnoError::Wav(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_wav(dir.path().join("nope.wav")).is_err());
    }
}
