//! Sample conversion used by the capture callback and the detector.
//!
//! The device delivers whatever it likes (interleaved, 44.1/48 kHz, `f32`);
//! the rest of the crate expects mono 16-bit PCM at the detector's rate:
//!
//! 1. [`stereo_to_mono`] averages interleaved channels.
//! 2. [`resample`] converts between rates with linear interpolation.
//! 3. [`f32_to_i16`] quantises to signed 16-bit.
//!
//! [`apply_gain`] scales already-quantised samples, saturating at the rails.

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Average `channels` interleaved channels into one.
///
/// A trailing partial frame is dropped. `channels == 0` yields nothing.
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = usize::from(n);
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Linear-interpolation resampler from `from_rate` to `to_rate` Hz.
///
/// Equal rates (or a zero rate on either side) return the input unchanged.
/// Output length is `ceil(len * to_rate / from_rate)`.
///
/// ```rust
/// use voice_command::audio::resample;
///
/// let hi = vec![0.25_f32; 480];
/// assert_eq!(resample(&hi, 48_000, 16_000).len(), 160);
/// ```
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            match samples.get(idx + 1) {
                Some(&next) => samples[idx] + (next - samples[idx]) * frac,
                None => samples[idx],
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Quantisation and gain
// ---------------------------------------------------------------------------

/// Convert `[-1.0, 1.0]` floats to `i16`, clamping out-of-range input.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

/// Convert `i16` PCM to `[-1.0, 1.0]` floats.
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / i16::MAX as f32).collect()
}

/// Multiply each sample by `gain`, saturating at `i16::MIN` / `i16::MAX`.
pub fn apply_gain(samples: &[i16], gain: f32) -> Vec<i16> {
    if (gain - 1.0).abs() < f32::EPSILON {
        return samples.to_vec();
    }
    samples
        .iter()
        .map(|&s| (s as f32 * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
