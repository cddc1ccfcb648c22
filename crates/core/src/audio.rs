//! PCM audio helpers
//!
//! All engine audio is signed 16-bit little-endian mono. These helpers stay
//! allocation-light; per-frame work happens on the session hot path.

/// Mean absolute sample amplitude of a little-endian i16 PCM frame.
///
/// An odd trailing byte is ignored. Empty frames report 0.
pub fn mean_abs_amplitude(pcm: &[u8]) -> f32 {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for chunk in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        sum += (sample as i64).unsigned_abs();
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum as f32 / count as f32
    }
}

/// Playback duration of a PCM buffer in milliseconds.
pub fn pcm_duration_ms(bytes: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    // 2 bytes per sample, mono.
    (bytes as u64 * 1000) / (sample_rate as u64 * 2)
}

/// Decode little-endian i16 bytes into samples.
pub fn bytes_to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Encode i16 samples as little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Wrap raw 16-bit mono PCM in a minimal WAV header for API upload.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate * 2;
    let mut buf = Vec::with_capacity(44 + pcm.len());
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes()); // block align
    buf.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    buf.extend_from_slice(pcm);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplitude_of_silence_is_zero() {
        assert_eq!(mean_abs_amplitude(&[0u8; 512]), 0.0);
    }

    #[test]
    fn amplitude_of_constant_signal() {
        let frame = samples_to_bytes(&[1000i16; 256]);
        assert!((mean_abs_amplitude(&frame) - 1000.0).abs() < f32::EPSILON);
    }

    #[test]
    fn odd_trailing_byte_ignored() {
        let mut frame = samples_to_bytes(&[500i16; 4]);
        frame.push(0xFF);
        assert!((mean_abs_amplitude(&frame) - 500.0).abs() < f32::EPSILON);
    }

    #[test]
    fn duration_from_bytes() {
        // 1 second at 16 kHz mono s16le = 32000 bytes.
        assert_eq!(pcm_duration_ms(32_000, 16_000), 1000);
        assert_eq!(pcm_duration_ms(48_000, 24_000), 1000);
        assert_eq!(pcm_duration_ms(0, 16_000), 0);
    }

    #[test]
    fn wav_header_is_well_formed() {
        let pcm = samples_to_bytes(&[0i16; 160]);
        let wav = pcm_to_wav(&pcm, 16_000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + pcm.len());
        let data_len = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_len as usize, pcm.len());
    }

    #[test]
    fn sample_byte_round_trip() {
        let samples = vec![-32768i16, -1, 0, 1, 32767];
        assert_eq!(bytes_to_samples(&samples_to_bytes(&samples)), samples);
    }
}
