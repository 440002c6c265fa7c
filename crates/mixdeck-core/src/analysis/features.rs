//! Spectral and temporal feature extraction
//!
//! All functions here are pure: they map one pair of byte windows (time
//! domain and frequency magnitudes, both `ANALYSIS_WINDOW` long) to scalar
//! features, with no hidden state. Degenerate input never fails; it
//! degrades to defined defaults (zero centroid, 120 BPM, zero energy) so a
//! momentarily silent buffer cannot crash the analysis loop.
//!
//! The tempo and key estimators are deliberately simple signal-processing
//! heuristics, tuned for steady dance material. Neither is a rigorous beat
//! tracker or key profile match; treat their output as a hint.

use serde::{Deserialize, Serialize};

use crate::music::MusicalKey;

/// Tempo estimates are clamped to this range (BPM)
pub const MIN_BPM: f32 = 60.0;
pub const MAX_BPM: f32 = 200.0;

/// Fallback tempo when fewer than two peaks are detected
pub const DEFAULT_BPM: f32 = 120.0;

/// Normalized amplitude a sample must exceed to count as a peak
const PEAK_THRESHOLD: f32 = 0.5;

/// Audible-pitch range considered by the chroma accumulator (Hz)
const CHROMA_MIN_HZ: f32 = 80.0;
const CHROMA_MAX_HZ: f32 = 2000.0;

/// Number of timbre fingerprint coefficients
pub const TIMBRE_COEFFS: usize = 13;

/// Band edges for the energy score (Hz): bass below 250, mid to 4k, high above
const BASS_MAX_HZ: f32 = 250.0;
const MID_MAX_HZ: f32 = 4000.0;

/// One analysis snapshot for a channel
///
/// Produced fresh every analysis cycle; consumers read the latest value by
/// channel id. The core retains no history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Tempo estimate in BPM, clamped to [60, 200]
    pub tempo: f32,
    /// Dominant musical key (heuristic)
    pub key: MusicalKey,
    /// Aggregate band-energy score, 0-100
    pub energy: f32,
    /// Spectral centroid in Hz (brightness proxy)
    pub spectral_centroid: f32,
    /// Root-mean-square level, 0-1
    pub rms: f32,
    /// Fraction of adjacent sample pairs crossing the midpoint
    pub zero_crossing_rate: f32,
    /// Coarse cosine-basis timbre fingerprint
    pub timbre: [f32; TIMBRE_COEFFS],
    /// RMS scaled to 0-100
    pub loudness: f32,
}

/// Compute one AnalysisResult from a time-domain byte window and a
/// frequency-magnitude byte window of equal length.
///
/// Time bytes follow the analyser convention: 128 = silence, 0..255 maps to
/// [-1, 1]. Frequency bytes are 8-bit normalized magnitudes.
pub fn analyze(time: &[u8], freq: &[u8], sample_rate: u32) -> AnalysisResult {
    let rms = compute_rms(time);
    AnalysisResult {
        tempo: estimate_tempo(time, sample_rate),
        key: estimate_key(freq, sample_rate),
        energy: band_energy_score(freq, sample_rate),
        spectral_centroid: spectral_centroid(freq, sample_rate),
        rms,
        zero_crossing_rate: zero_crossing_rate(time),
        timbre: timbre_fingerprint(freq),
        loudness: rms * 100.0,
    }
}

/// Normalize a time-domain byte to [-1, 1], centered on 128
#[inline]
fn norm_time(byte: u8) -> f32 {
    (byte as f32 - 128.0) / 128.0
}

/// Root-mean-square of the normalized time-domain window
pub fn compute_rms(time: &[u8]) -> f32 {
    if time.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = time.iter().map(|&b| norm_time(b).powi(2)).sum();
    (sum_sq / time.len() as f32).sqrt()
}

/// Magnitude-weighted average of bin center frequencies, in Hz
///
/// Bin `i` maps to `i * sample_rate / (2 * len)`. Zero when the spectrum
/// carries no energy (division guarded).
pub fn spectral_centroid(freq: &[u8], sample_rate: u32) -> f32 {
    let total: f32 = freq.iter().map(|&m| m as f32).sum();
    if total <= 0.0 || freq.is_empty() {
        return 0.0;
    }

    let bin_width = sample_rate as f32 / (2.0 * freq.len() as f32);
    let weighted: f32 = freq
        .iter()
        .enumerate()
        .map(|(i, &m)| i as f32 * bin_width * m as f32)
        .sum();
    weighted / total
}

/// Fraction of adjacent sample pairs whose product is negative after
/// centering on the midpoint amplitude
pub fn zero_crossing_rate(time: &[u8]) -> f32 {
    if time.len() < 2 {
        return 0.0;
    }
    let crossings = time
        .windows(2)
        .filter(|pair| norm_time(pair[0]) * norm_time(pair[1]) < 0.0)
        .count();
    crossings as f32 / (time.len() - 1) as f32
}

/// Naive peak-picking tempo estimate in BPM
///
/// A sample is a peak when it exceeds a fixed amplitude threshold and both
/// neighbors. The average inter-peak distance converts to beats per second
/// via `sample_rate / (interval * 4)` (four peaks per beat assumed), then
/// to BPM clamped to [60, 200]. Fewer than two peaks yields 120.
pub fn estimate_tempo(time: &[u8], sample_rate: u32) -> f32 {
    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..time.len().saturating_sub(1) {
        let v = norm_time(time[i]);
        if v > PEAK_THRESHOLD && v > norm_time(time[i - 1]) && v > norm_time(time[i + 1]) {
            peaks.push(i);
        }
    }

    if peaks.len() < 2 {
        return DEFAULT_BPM;
    }

    let total_span = (peaks[peaks.len() - 1] - peaks[0]) as f32;
    let avg_interval = total_span / (peaks.len() - 1) as f32;
    if avg_interval <= 0.0 {
        return DEFAULT_BPM;
    }

    let beats_per_second = sample_rate as f32 / (avg_interval * 4.0);
    (beats_per_second * 60.0).clamp(MIN_BPM, MAX_BPM)
}

/// Average squared normalized magnitude over one bin range
fn band_mean_sq(freq: &[u8], range: std::ops::Range<usize>) -> f32 {
    let range = range.start.min(freq.len())..range.end.min(freq.len());
    if range.is_empty() {
        return 0.0;
    }
    let len = range.len() as f32;
    freq[range]
        .iter()
        .map(|&m| (m as f32 / 255.0).powi(2))
        .sum::<f32>()
        / len
}

/// Combined bass/mid/high band energy score, clamped to at most 100
pub fn band_energy_score(freq: &[u8], sample_rate: u32) -> f32 {
    if freq.is_empty() {
        return 0.0;
    }
    let bin_width = sample_rate as f32 / (2.0 * freq.len() as f32);
    let bass_end = (BASS_MAX_HZ / bin_width).ceil() as usize;
    let mid_end = (MID_MAX_HZ / bin_width).ceil() as usize;

    let bass = band_mean_sq(freq, 0..bass_end);
    let mid = band_mean_sq(freq, bass_end..mid_end);
    let high = band_mean_sq(freq, mid_end..freq.len());

    ((bass + mid + high) * 100.0).min(100.0)
}

/// Chroma-based key estimate
///
/// Each bin in the 80-2000 Hz range maps to a semitone class relative to
/// A440 via `round(12 * log2(f / 440)) mod 12`, weighted by magnitude. The
/// class with maximum accumulated weight is the tonic; the accumulated
/// weight of the major third (tonic+4) against the minor third (tonic+3)
/// decides the scale, major winning ties. Scale-invariant by construction.
pub fn estimate_key(freq: &[u8], sample_rate: u32) -> MusicalKey {
    let mut chroma = [0.0f32; 12];
    if !freq.is_empty() {
        let bin_width = sample_rate as f32 / (2.0 * freq.len() as f32);
        for (i, &m) in freq.iter().enumerate() {
            if m == 0 {
                continue;
            }
            let f = i as f32 * bin_width;
            if !(CHROMA_MIN_HZ..=CHROMA_MAX_HZ).contains(&f) {
                continue;
            }
            let semitone = (12.0 * (f / 440.0).log2()).round() as i32;
            let class = semitone.rem_euclid(12) as usize;
            chroma[class] += m as f32;
        }
    }

    // Tonic = class with maximum accumulated weight (index 0 = A)
    let mut tonic = 0usize;
    for (class, &weight) in chroma.iter().enumerate() {
        if weight > chroma[tonic] {
            tonic = class;
        }
    }

    let major_third = chroma[(tonic + 4) % 12];
    let minor_third = chroma[(tonic + 3) % 12];
    let minor = minor_third > major_third;

    // Chroma index is relative to A (pitch class 9)
    let root = ((tonic + 9) % 12) as u8;
    MusicalKey::new(root, minor)
}

/// Fixed-length cosine-basis projection of the magnitude spectrum
///
/// A coarse cepstral-style summary (DCT-II over normalized magnitudes), not
/// a perceptually calibrated MFCC. Deterministic for identical input.
pub fn timbre_fingerprint(freq: &[u8]) -> [f32; TIMBRE_COEFFS] {
    let mut coeffs = [0.0f32; TIMBRE_COEFFS];
    if freq.is_empty() {
        return coeffs;
    }

    let n = freq.len() as f32;
    for (k, coeff) in coeffs.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (i, &m) in freq.iter().enumerate() {
            let angle = std::f32::consts::PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n);
            acc += (m as f32 / 255.0) * angle.cos();
        }
        *coeff = acc / n;
    }
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44_100;
    const N: usize = 1024;

    fn silent_time() -> Vec<u8> {
        vec![128u8; N]
    }

    #[test]
    fn test_silence_yields_zero_features() {
        let time = silent_time();
        assert_eq!(compute_rms(&time), 0.0);
        assert_eq!(zero_crossing_rate(&time), 0.0);

        let result = analyze(&time, &vec![0u8; N], SR);
        assert_eq!(result.loudness, 0.0);
        assert_eq!(result.rms, 0.0);
        assert_eq!(result.energy, 0.0);
    }

    #[test]
    fn test_rms_of_full_scale_square() {
        // Alternating 0/255 is roughly a full-scale square wave
        let time: Vec<u8> = (0..N).map(|i| if i % 2 == 0 { 255 } else { 0 }).collect();
        let rms = compute_rms(&time);
        assert!((rms - 0.996).abs() < 0.01, "rms = {}", rms);

        let zcr = zero_crossing_rate(&time);
        assert!(zcr > 0.99, "zcr = {}", zcr);
    }

    #[test]
    fn test_centroid_of_empty_spectrum_is_zero() {
        assert_eq!(spectral_centroid(&vec![0u8; N], SR), 0.0);
    }

    #[test]
    fn test_centroid_of_single_bin() {
        let mut freq = vec![0u8; N];
        freq[100] = 200;
        let bin_width = SR as f32 / (2.0 * N as f32);
        let centroid = spectral_centroid(&freq, SR);
        assert!((centroid - 100.0 * bin_width).abs() < 0.001);
    }

    #[test]
    fn test_tempo_default_without_peaks() {
        assert_eq!(estimate_tempo(&silent_time(), SR), DEFAULT_BPM);

        // A single peak is not enough either
        let mut time = silent_time();
        time[100] = 255;
        assert_eq!(estimate_tempo(&time, SR), DEFAULT_BPM);
    }

    #[test]
    fn test_tempo_clamped_to_range() {
        // Peaks every 500 samples: 44100 / (500 * 4) * 60 = 1323 BPM -> 200
        let mut time = silent_time();
        for i in (10..N).step_by(500) {
            time[i] = 255;
        }
        assert_eq!(estimate_tempo(&time, SR), MAX_BPM);
    }

    #[test]
    fn test_energy_clamped_to_100() {
        let freq = vec![255u8; N];
        assert_eq!(band_energy_score(&freq, SR), 100.0);
    }

    #[test]
    fn test_key_of_pure_a440() {
        let bin_width = SR as f32 / (2.0 * N as f32);
        let bin = (440.0 / bin_width).round() as usize;
        let mut freq = vec![0u8; N];
        freq[bin] = 200;

        let key = estimate_key(&freq, SR);
        assert_eq!(key.note_name(), "A");
        // No third content: major wins the tie
        assert!(!key.minor);
    }

    #[test]
    fn test_key_is_scale_invariant() {
        let bin_width = SR as f32 / (2.0 * N as f32);
        let mut freq = vec![0u8; N];
        freq[(440.0 / bin_width).round() as usize] = 100;
        freq[(523.25 / bin_width).round() as usize] = 60; // C5: minor third of A

        let base = estimate_key(&freq, SR);

        // Doubling all magnitudes must not change the verdict
        let doubled: Vec<u8> = freq.iter().map(|&m| m.saturating_mul(2)).collect();
        assert_eq!(estimate_key(&doubled, SR), base);
    }

    #[test]
    fn test_minor_third_wins_over_absent_major() {
        let bin_width = SR as f32 / (2.0 * N as f32);
        let mut freq = vec![0u8; N];
        freq[(440.0 / bin_width).round() as usize] = 200;
        freq[(523.25 / bin_width).round() as usize] = 90; // C natural above A

        let key = estimate_key(&freq, SR);
        assert_eq!(key.note_name(), "A");
        assert!(key.minor);
    }

    #[test]
    fn test_timbre_fingerprint_deterministic() {
        let freq: Vec<u8> = (0..N).map(|i| (i % 251) as u8).collect();
        let a = timbre_fingerprint(&freq);
        let b = timbre_fingerprint(&freq);
        assert_eq!(a, b);
        // First coefficient is the scaled magnitude mean, must be non-zero here
        assert!(a[0] > 0.0);
    }
}
