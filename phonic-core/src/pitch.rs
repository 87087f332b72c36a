//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a frame from the
//! peaks of its autocorrelation function. It works directly on the
//! time-domain frame and is independent of the spectral/cepstral path.
//!
//! ## Features
//! - Direct O(F²) autocorrelation summation
//! - FFT-domain (Wiener–Khinchin) autocorrelation for long frames
//! - Rising-then-falling peak picking, strongest peak wins
//! - Plausibility bounds that turn implausible lags into "unvoiced"

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::fft::Fft;

/// How the autocorrelation function is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutocorrelationMethod {
    /// Explicit lagged products.
    #[default]
    Direct,
    /// Inverse FFT of the power spectrum.
    Fft,
}

/// Result of a pitch estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PitchEstimate {
    /// A plausible periodicity was found.
    Voiced {
        /// Fundamental frequency in Hz.
        frequency: f64,
        /// Autocorrelation lag in samples the frequency came from.
        lag: usize,
    },
    /// No usable peak, or the peak gave an implausible frequency.
    Unvoiced,
}

impl PitchEstimate {
    /// Frequency in Hz, or 0 for an unvoiced frame.
    pub fn hz(&self) -> f64 {
        match self {
            PitchEstimate::Voiced { frequency, .. } => *frequency,
            PitchEstimate::Unvoiced => 0.0,
        }
    }

    /// Frequency in Hz when voiced.
    pub fn frequency(&self) -> Option<f64> {
        match self {
            PitchEstimate::Voiced { frequency, .. } => Some(*frequency),
            PitchEstimate::Unvoiced => None,
        }
    }

    /// True for [`PitchEstimate::Voiced`].
    pub fn is_voiced(&self) -> bool {
        matches!(self, PitchEstimate::Voiced { .. })
    }
}

/// Direct autocorrelation: `R[τ] = Σ_{j=0}^{F-τ-1} x[j]·x[j+τ]` for τ in `[0, F)`.
pub fn autocorrelation_direct(frame: &[f64]) -> Vec<f64> {
    let n = frame.len();
    (0..n)
        .map(|tau| {
            frame[..n - tau]
                .iter()
                .zip(&frame[tau..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Lag of the strongest autocorrelation peak.
///
/// Scanning `m` from 3 upward, `m - 1` is a peak when
/// `R[m-1] - R[m-2] >= 0` and `R[m] - R[m-1] < 0`. Among all peaks the one
/// with the largest `R` wins; on a tie the smaller lag wins.
///
/// # Returns
/// * `Some(lag)` - Index of the chosen peak
/// * `None` - The function never rises and then falls
pub fn pick_peak(r: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for m in 3..r.len() {
        if r[m - 1] - r[m - 2] >= 0.0 && r[m] - r[m - 1] < 0.0 {
            let lag = m - 1;
            match best {
                Some(b) if r[lag] <= r[b] => {}
                _ => best = Some(lag),
            }
        }
    }
    best
}

/// Estimates pitch from frames of a fixed length.
#[derive(Debug, Clone)]
pub struct AutocorrelationPitchEstimator {
    sample_rate: u32,
    frame_len: usize,
    lower_bound: f64,
    upper_bound: f64,
    method: AutocorrelationMethod,
    fft: Fft,
}

impl AutocorrelationPitchEstimator {
    /// Creates an estimator.
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `frame_len` - Samples per frame
    /// * `lower_bound` - Frequencies below this (Hz) are unvoiced
    /// * `upper_bound` - Frequencies above this (Hz) are unvoiced
    /// * `method` - Direct or FFT-domain autocorrelation
    ///
    /// # Returns
    /// * `Err(EngineError::InvalidConfig)` - Zero sample rate or frame length,
    ///   or bounds that are negative, non-finite or not increasing
    pub fn new(
        sample_rate: u32,
        frame_len: usize,
        lower_bound: f64,
        upper_bound: f64,
        method: AutocorrelationMethod,
    ) -> Result<Self> {
        if sample_rate == 0 {
            return Err(EngineError::config("sample rate must be positive"));
        }
        if frame_len == 0 {
            return Err(EngineError::config("frame length must be positive"));
        }
        if !(lower_bound.is_finite() && lower_bound >= 0.0) {
            return Err(EngineError::config(format!(
                "pitch lower bound must be non-negative: {lower_bound}"
            )));
        }
        if !(upper_bound.is_finite() && upper_bound > lower_bound) {
            return Err(EngineError::config(format!(
                "pitch upper bound must be larger than lower bound: lower = {lower_bound}, upper = {upper_bound}"
            )));
        }
        Ok(Self {
            sample_rate,
            frame_len,
            lower_bound,
            upper_bound,
            method,
            // twice the frame so circular wrap-around never overlaps real lags
            fft: Fft::for_frame(frame_len.checked_mul(2).ok_or_else(|| {
                EngineError::config(format!("frame of {frame_len} samples is too long"))
            })?)?,
        })
    }

    /// Frame length this estimator accepts.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Autocorrelation method in use.
    pub fn method(&self) -> AutocorrelationMethod {
        self.method
    }

    /// Autocorrelation of `frame` for lags `0..frame_len`.
    pub fn autocorrelation(&self, frame: &[f64]) -> Result<Vec<f64>> {
        EngineError::check_frame_len(self.frame_len, frame.len())?;
        match self.method {
            AutocorrelationMethod::Direct => Ok(autocorrelation_direct(frame)),
            AutocorrelationMethod::Fft => self.autocorrelation_fft(frame),
        }
    }

    fn autocorrelation_fft(&self, frame: &[f64]) -> Result<Vec<f64>> {
        let mut buffer: Vec<Complex<f64>> = frame.iter().map(|&x| Complex::new(x, 0.0)).collect();
        buffer.resize(self.fft.size(), Complex::new(0.0, 0.0));

        self.fft.forward(&mut buffer)?;
        for c in buffer.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        self.fft.inverse(&mut buffer)?;

        Ok(buffer.iter().take(self.frame_len).map(|c| c.re).collect())
    }

    /// Converts a peak lag into an estimate, applying the plausibility bounds.
    pub fn lag_to_estimate(&self, lag: usize) -> PitchEstimate {
        if lag == 0 {
            return PitchEstimate::Unvoiced;
        }
        let frequency = f64::from(self.sample_rate) / lag as f64;
        if frequency > self.upper_bound || frequency < self.lower_bound {
            return PitchEstimate::Unvoiced;
        }
        PitchEstimate::Voiced { frequency, lag }
    }

    /// Estimates the fundamental frequency of one frame.
    ///
    /// This function:
    /// 1. Computes the autocorrelation with the configured method
    /// 2. Picks the strongest rising-then-falling peak
    /// 3. Converts its lag to `sample_rate / lag`
    ///
    /// A peak whose autocorrelation is not positive carries no periodicity
    /// and is reported as unvoiced.
    ///
    /// # Returns
    /// * `Ok(PitchEstimate::Voiced)` - Plausible fundamental found
    /// * `Ok(PitchEstimate::Unvoiced)` - No peak, or an implausible frequency
    /// * `Err(EngineError::FrameLengthMismatch)` - Wrong frame length
    pub fn estimate(&self, frame: &[f64]) -> Result<PitchEstimate> {
        let r = self.autocorrelation(frame)?;
        Ok(match pick_peak(&r) {
            Some(lag) if r[lag] > 0.0 => self.lag_to_estimate(lag),
            _ => PitchEstimate::Unvoiced,
        })
    }

    /// Smallest lag step around `estimate`, in Hz: `sr/lag - sr/(lag+1)`.
    pub fn resolution(&self, estimate: &PitchEstimate) -> Option<f64> {
        match estimate {
            PitchEstimate::Voiced { lag, .. } => {
                let sr = f64::from(self.sample_rate);
                Some(sr / *lag as f64 - sr / (*lag + 1) as f64)
            }
            PitchEstimate::Unvoiced => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sample_rate: u32, n: usize, amplitude: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / f64::from(sample_rate)).sin())
            .collect()
    }

    fn estimator(sample_rate: u32, frame_len: usize, method: AutocorrelationMethod) -> AutocorrelationPitchEstimator {
        AutocorrelationPitchEstimator::new(sample_rate, frame_len, 0.0, 2000.0, method).unwrap()
    }

    #[test]
    fn known_sequence_picks_first_of_equal_peaks() {
        // peaks at lag 2 (R=6) and lag 7 (R=6): the tie goes to lag 2
        let r = [10.0, 6.0, 6.0, 2.0, -1.0, -1.0, 3.0, 6.0, 5.0, 1.0];
        assert_eq!(pick_peak(&r), Some(2));
    }

    #[test]
    fn strongest_peak_wins() {
        let r = [10.0, 2.0, 3.0, 1.0, 5.0, 7.0, 4.0];
        assert_eq!(pick_peak(&r), Some(5));
    }

    #[test]
    fn monotonic_function_has_no_peak() {
        assert_eq!(pick_peak(&[5.0, 4.0, 3.0, 2.0, 1.0]), None);
        assert_eq!(pick_peak(&[1.0, 2.0]), None);
        assert_eq!(pick_peak(&[]), None);
    }

    #[test]
    fn direct_autocorrelation_by_hand() {
        let r = autocorrelation_direct(&[1.0, 2.0, 3.0]);
        assert_eq!(r, vec![14.0, 8.0, 3.0]);
    }

    #[test]
    fn fft_autocorrelation_matches_direct() {
        let frame = sine(311.0, 16000, 500, 0.7);
        let direct = autocorrelation_direct(&frame);
        let via_fft = estimator(16000, 500, AutocorrelationMethod::Fft)
            .autocorrelation(&frame)
            .unwrap();
        assert_eq!(via_fft.len(), 500);
        for tau in 0..500 {
            assert!((direct[tau] - via_fft[tau]).abs() < 1e-9, "lag {tau}");
        }
    }

    #[test]
    fn a440_within_one_lag_step() {
        for method in [AutocorrelationMethod::Direct, AutocorrelationMethod::Fft] {
            let est = estimator(16000, 1024, method);
            let frame = sine(440.0, 16000, 1024, 0.8);
            let pitch = est.estimate(&frame).unwrap();
            let step = est.resolution(&pitch).unwrap();
            assert!(
                (pitch.hz() - 440.0).abs() <= step,
                "{method:?}: {} Hz (step {step})",
                pitch.hz()
            );
        }
    }

    #[test]
    fn bounds_make_estimates_unvoiced() {
        let frame = sine(440.0, 16000, 1024, 0.8);
        let capped = AutocorrelationPitchEstimator::new(16000, 1024, 0.0, 300.0, AutocorrelationMethod::Direct)
            .unwrap();
        assert_eq!(capped.estimate(&frame).unwrap(), PitchEstimate::Unvoiced);
        let floored = AutocorrelationPitchEstimator::new(16000, 1024, 500.0, 1000.0, AutocorrelationMethod::Direct)
            .unwrap();
        assert_eq!(floored.estimate(&frame).unwrap().hz(), 0.0);
        assert_eq!(capped.lag_to_estimate(0), PitchEstimate::Unvoiced);
    }

    #[test]
    fn silence_is_unvoiced() {
        let est = estimator(16000, 256, AutocorrelationMethod::Direct);
        let pitch = est.estimate(&[0.0; 256]).unwrap();
        assert!(!pitch.is_voiced());
        assert_eq!(pitch.frequency(), None);
    }

    #[test]
    fn rejects_bad_configuration_and_frames() {
        assert!(AutocorrelationPitchEstimator::new(16000, 256, 500.0, 500.0, AutocorrelationMethod::Direct).is_err());
        assert!(AutocorrelationPitchEstimator::new(0, 256, 0.0, 500.0, AutocorrelationMethod::Direct).is_err());
        assert!(matches!(
            AutocorrelationPitchEstimator::new(16000, usize::MAX / 2 + 1, 0.0, 500.0, AutocorrelationMethod::Fft),
            Err(EngineError::InvalidConfig(_))
        ));
        let est = estimator(16000, 256, AutocorrelationMethod::Direct);
        assert!(matches!(
            est.estimate(&[0.0; 255]),
            Err(EngineError::FrameLengthMismatch { expected: 256, got: 255 })
        ));
    }
}
