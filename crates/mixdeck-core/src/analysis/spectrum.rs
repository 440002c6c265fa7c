//! FFT front-end for the analysis worker
//!
//! Converts a 2048-sample mono window into the two byte buffers the feature
//! functions consume: a 1024-byte time-domain view (midpoint 128) and a
//! 1024-byte magnitude spectrum on a dB scale.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::types::{ANALYSIS_WINDOW, FFT_SIZE};

/// dB range mapped onto the 0-255 magnitude bytes
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Reusable FFT state for one analysis worker
///
/// Owns the plan, the Hann window, and scratch buffers so the per-cycle
/// path allocates nothing.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        let window: Vec<f32> = (0..FFT_SIZE)
            .map(|i| {
                let x = i as f32 / (FFT_SIZE - 1) as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * x).cos())
            })
            .collect();
        SpectrumAnalyzer {
            fft,
            window,
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
        }
    }

    /// Fill `freq_out` with dB-scaled magnitude bytes for one window of
    /// `FFT_SIZE` samples. Output length is `ANALYSIS_WINDOW` (half the FFT).
    pub fn magnitude_bytes(&mut self, samples: &[f32], freq_out: &mut [u8]) {
        debug_assert_eq!(samples.len(), FFT_SIZE);
        debug_assert_eq!(freq_out.len(), ANALYSIS_WINDOW);

        for (i, (&s, &w)) in samples.iter().zip(self.window.iter()).enumerate() {
            self.scratch[i] = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / FFT_SIZE as f32;
        for (bin, byte) in freq_out.iter_mut().enumerate() {
            let mag = self.scratch[bin].norm() * norm;
            *byte = db_to_byte(20.0 * mag.max(1e-12).log10());
        }
    }

    /// Fill `time_out` with midpoint-128 bytes from the most recent
    /// `ANALYSIS_WINDOW` samples of the window.
    pub fn time_bytes(samples: &[f32], time_out: &mut [u8]) {
        debug_assert!(samples.len() >= ANALYSIS_WINDOW);
        let tail = &samples[samples.len() - ANALYSIS_WINDOW..];
        for (&s, byte) in tail.iter().zip(time_out.iter_mut()) {
            *byte = ((s.clamp(-1.0, 1.0) + 1.0) * 127.5).round() as u8;
        }
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a dB value onto 0-255, clipping outside [MIN_DB, MAX_DB]
#[inline]
fn db_to_byte(db: f32) -> u8 {
    let scaled = 255.0 * (db - MIN_DB) / (MAX_DB - MIN_DB);
    scaled.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_byte_mapping_endpoints() {
        assert_eq!(db_to_byte(-100.0), 0);
        assert_eq!(db_to_byte(-30.0), 255);
        assert_eq!(db_to_byte(-200.0), 0);
        assert_eq!(db_to_byte(0.0), 255);
    }

    #[test]
    fn test_time_bytes_center_silence_on_128() {
        let samples = vec![0.0f32; FFT_SIZE];
        let mut out = vec![0u8; ANALYSIS_WINDOW];
        SpectrumAnalyzer::time_bytes(&samples, &mut out);
        assert!(out.iter().all(|&b| b == 128));
    }

    #[test]
    fn test_time_bytes_clamp_overrange() {
        let mut samples = vec![0.0f32; FFT_SIZE];
        samples[FFT_SIZE - 1] = 2.0;
        samples[FFT_SIZE - 2] = -2.0;
        let mut out = vec![0u8; ANALYSIS_WINDOW];
        SpectrumAnalyzer::time_bytes(&samples, &mut out);
        assert_eq!(out[ANALYSIS_WINDOW - 1], 255);
        assert_eq!(out[ANALYSIS_WINDOW - 2], 0);
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let sr = crate::types::SAMPLE_RATE as f32;
        let bin_width = sr / FFT_SIZE as f32;
        let target_bin = 20usize;
        let f = target_bin as f32 * bin_width;

        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|i| (2.0 * std::f32::consts::PI * f * i as f32 / sr).sin())
            .collect();

        let mut analyzer = SpectrumAnalyzer::new();
        let mut freq = vec![0u8; ANALYSIS_WINDOW];
        analyzer.magnitude_bytes(&samples, &mut freq);

        let peak_bin = freq
            .iter()
            .enumerate()
            .max_by_key(|&(_, &m)| m)
            .map(|(i, _)| i)
            .unwrap();
        assert!(
            (peak_bin as i64 - target_bin as i64).abs() <= 1,
            "peak at bin {}, expected {}",
            peak_bin,
            target_bin
        );
    }
}
