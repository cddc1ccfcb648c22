//! Sample-rate conversion
//!
//! Providers emit PCM at their native rate; the session egress rate is
//! fixed, so mismatches are converted here. Uses the FFT resampler with a
//! linear-interpolation fallback for very short buffers.

use rubato::{FftFixedIn, Resampler as RubatoResampler};

use voice_engine_core::audio::{bytes_to_samples, samples_to_bytes};

/// Resample 16-bit mono PCM bytes from `from_rate` to `to_rate`.
pub fn resample_pcm16(input: &[u8], from_rate: u32, to_rate: u32) -> Vec<u8> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let samples = bytes_to_samples(input);
    let as_f64: Vec<f64> = samples.iter().map(|&s| s as f64 / 32768.0).collect();

    let resampled = resample_f64(&as_f64, from_rate, to_rate);

    let out: Vec<i16> = resampled
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect();
    samples_to_bytes(&out)
}

fn resample_f64(input: &[f64], from_rate: u32, to_rate: u32) -> Vec<f64> {
    // Output length is fixed by the rate ratio; the FFT path is normalised
    // to it so callers see the same length regardless of chunking.
    let expected = (input.len() as f64 * to_rate as f64 / from_rate as f64).ceil() as usize;

    if input.len() < 64 {
        return resample_linear(input, from_rate, to_rate);
    }

    let chunk_size = input.len().min(1024);
    match FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1) {
        Ok(mut resampler) => {
            let mut output = Vec::with_capacity(expected);
            for chunk in input.chunks(chunk_size) {
                let frame = if chunk.len() == chunk_size {
                    chunk.to_vec()
                } else {
                    // Pad the tail chunk to the fixed input size.
                    let mut padded = chunk.to_vec();
                    padded.resize(chunk_size, 0.0);
                    padded
                };
                match resampler.process(&[frame], None) {
                    Ok(frames) => output.extend_from_slice(&frames[0]),
                    Err(e) => {
                        tracing::warn!("resampler failed mid-stream: {}", e);
                        return resample_linear(input, from_rate, to_rate);
                    }
                }
            }
            output.resize(expected, 0.0);
            output
        }
        Err(e) => {
            tracing::warn!("resampler init failed: {}", e);
            resample_linear(input, from_rate, to_rate)
        }
    }
}

fn resample_linear(input: &[f64], from_rate: u32, to_rate: u32) -> Vec<f64> {
    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (input.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 / ratio;
        let idx_floor = src_idx.floor() as usize;
        let idx_ceil = (idx_floor + 1).min(input.len().saturating_sub(1));
        let frac = src_idx - idx_floor as f64;
        let sample = input[idx_floor] * (1.0 - frac) + input[idx_ceil] * frac;
        output.push(sample);
    }

    output
}
