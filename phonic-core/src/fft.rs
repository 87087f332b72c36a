//! # Fast Fourier Transform (FFT) Module
//!
//! This module wraps RustFFT for the analysis pipeline. Every transform in
//! the engine (spectrum, cepstrum, FFT-domain autocorrelation) goes through
//! an [`Fft`] planned once for a fixed power-of-two size.
//!
//! ## Features
//! - Power-of-two size selection for zero-padded transforms
//! - Real-input forward transform returning the `size/2 + 1` non-redundant bins
//! - Normalized inverse transforms (forward then inverse is the identity)
//! - Hann windowing for spectrogram display

use std::sync::Arc;

use rustfft::{FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Smallest power of two greater than or equal to `len` (1 for an empty frame).
pub fn fft_size(len: usize) -> usize {
    len.max(1).next_power_of_two()
}

/// Window applied to a frame before its spectrum is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// No windowing.
    #[default]
    Rectangular,
    /// Hann window (raised cosine), zero at both ends.
    Hann,
}

impl Window {
    /// Window weights for a frame of `len` samples.
    ///
    /// Hann uses the symmetric form `0.5 - 0.5·cos(2πi/(len-1))`; frames
    /// shorter than two samples are left unweighted.
    pub fn coefficients(&self, len: usize) -> Vec<f64> {
        match self {
            Window::Hann if len >= 2 => {
                let span = (len - 1) as f64;
                (0..len)
                    .map(|i| 0.5 - 0.5 * (std::f64::consts::TAU * i as f64 / span).cos())
                    .collect()
            }
            _ => vec![1.0; len],
        }
    }
}

/// Forward and inverse transforms planned for one size.
///
/// Plans are shared behind `Arc`, so an `Fft` is cheap to clone and safe to
/// use from several threads at once.
#[derive(Clone)]
pub struct Fft {
    size: usize,
    forward: Arc<dyn rustfft::Fft<f64>>,
    inverse: Arc<dyn rustfft::Fft<f64>>,
}

impl std::fmt::Debug for Fft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fft").field("size", &self.size).finish()
    }
}

impl Fft {
    /// Plans transforms of `size` points.
    ///
    /// # Returns
    /// * `Err(EngineError::InvalidConfig)` - `size` is not a power of two
    pub fn new(size: usize) -> Result<Self> {
        if !size.is_power_of_two() {
            return Err(EngineError::config(format!(
                "FFT size must be a power of two, got {size}"
            )));
        }
        let mut planner = FftPlanner::new();
        Ok(Self {
            size,
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
        })
    }

    /// Plans transforms large enough for a frame of `frame_len` samples.
    ///
    /// # Returns
    /// * `Err(EngineError::InvalidConfig)` - No power of two fits in `usize`
    pub fn for_frame(frame_len: usize) -> Result<Self> {
        let size = frame_len.max(1).checked_next_power_of_two().ok_or_else(|| {
            EngineError::config(format!("no FFT size can hold a frame of {frame_len} samples"))
        })?;
        Self::new(size)
    }

    /// Transform length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bins returned by [`Fft::forward_real`].
    pub fn half_len(&self) -> usize {
        self.size / 2 + 1
    }

    /// In-place forward transform of a full-length complex buffer.
    pub fn forward(&self, buffer: &mut [Complex<f64>]) -> Result<()> {
        EngineError::check_frame_len(self.size, buffer.len())?;
        self.forward.process(buffer);
        Ok(())
    }

    /// In-place inverse transform, scaled by `1/size`.
    pub fn inverse(&self, buffer: &mut [Complex<f64>]) -> Result<()> {
        EngineError::check_frame_len(self.size, buffer.len())?;
        self.inverse.process(buffer);
        let scale = 1.0 / self.size as f64;
        for c in buffer.iter_mut() {
            *c *= scale;
        }
        Ok(())
    }

    /// Forward transform of a real signal, zero-padded to the transform size.
    ///
    /// # Arguments
    /// * `input` - Real samples, at most `size` of them
    ///
    /// # Returns
    /// * `Ok(bins)` - The `size/2 + 1` bins from DC to Nyquist
    /// * `Err(EngineError::FrameLengthMismatch)` - `input` is longer than the transform
    pub fn forward_real(&self, input: &[f64]) -> Result<Vec<Complex<f64>>> {
        if input.len() > self.size {
            return Err(EngineError::FrameLengthMismatch {
                expected: self.size,
                got: input.len(),
            });
        }
        let mut buffer: Vec<Complex<f64>> =
            input.iter().map(|&x| Complex::new(x, 0.0)).collect();
        buffer.resize(self.size, Complex::new(0.0, 0.0));

        self.forward.process(&mut buffer);

        buffer.truncate(self.half_len());
        Ok(buffer)
    }

    /// Inverse of [`Fft::forward_real`]: rebuilds the conjugate-symmetric
    /// spectrum from its `size/2 + 1` bins and returns the real signal.
    pub fn inverse_real(&self, half: &[Complex<f64>]) -> Result<Vec<f64>> {
        EngineError::check_frame_len(self.half_len(), half.len())?;
        let mut buffer = vec![Complex::new(0.0, 0.0); self.size];
        for (k, &c) in half.iter().enumerate().take(self.size) {
            buffer[k] = c;
        }
        for k in 1..self.size.div_ceil(2) {
            buffer[self.size - k] = half[k].conj();
        }
        self.inverse(&mut buffer)?;
        Ok(buffer.iter().map(|c| c.re).collect())
    }
}
