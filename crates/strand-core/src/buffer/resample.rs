//! Sample rate conversion
//!
//! Thin wrapper around rubato. A failed conversion returns `None` and
//! the caller produces silence for that tick; the engine never retries
//! mid-tick and never propagates the fault out of the audio path.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Resample a mono block from `src_rate` to `dst_rate`
///
/// Returns `None` if the resampler cannot be constructed or processing
/// fails; equal rates return the input unchanged.
pub fn resample(src: &[f32], src_rate: u32, dst_rate: u32) -> Option<Vec<f32>> {
    if src_rate == dst_rate {
        return Some(src.to_vec());
    }
    if src.is_empty() || src_rate == 0 || dst_rate == 0 {
        return None;
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = match SincFixedIn::<f32>::new(
        dst_rate as f64 / src_rate as f64,
        2.0,
        params,
        src.len(),
        1,
    ) {
        Ok(resampler) => resampler,
        Err(e) => {
            log::warn!("resample: construction failed: {}", e);
            return None;
        }
    };

    match resampler.process(&[src], None) {
        Ok(mut channels) => Some(channels.swap_remove(0)),
        Err(e) => {
            log::warn!("resample: processing failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_rates_pass_through() {
        let src = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample(&src, 48000, 48000), Some(src));
    }

    #[test]
    fn test_doubling_rate_doubles_length() {
        let src = vec![0.0f32; 1024];
        let out = resample(&src, 44100, 88200).unwrap();
        let ratio = out.len() as f64 / src.len() as f64;
        assert!((ratio - 2.0).abs() < 0.1, "unexpected ratio {}", ratio);
    }

    #[test]
    fn test_empty_input_degrades() {
        assert_eq!(resample(&[], 44100, 48000), None);
        assert_eq!(resample(&[0.0], 0, 48000), None);
    }
}
