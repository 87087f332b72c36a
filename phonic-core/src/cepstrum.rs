//! # Cepstrum Module
//!
//! Cepstral coefficients are the real parts of a second forward FFT taken
//! over the log-magnitude spectrum. The `fft_size/2 + 1` log bins are first
//! truncated by one (dropping the Nyquist bin) so the second transform has a
//! power-of-two length. This is an FFT, not a DCT: reference models were
//! trained on exactly these numbers.

use std::ops::Deref;

use crate::error::{EngineError, Result};
use crate::fft::Fft;
use crate::spectrum::LogMagnitudeSpectrum;

/// Low-order cepstral coefficients of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CepstrumVector(Vec<f64>);

impl CepstrumVector {
    /// Wraps precomputed coefficients.
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self(coefficients)
    }

    /// Consumes the vector, returning the coefficients.
    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

impl Deref for CepstrumVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl AsRef<[f64]> for CepstrumVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Extracts the first `order` cepstral coefficients from log spectra of one size.
#[derive(Debug, Clone)]
pub struct CepstrumExtractor {
    order: usize,
    fft: Fft,
}

impl CepstrumExtractor {
    /// Creates an extractor for spectra computed with `fft_size` points.
    ///
    /// # Returns
    /// * `Err(EngineError::InvalidConfig)` - `fft_size` is not a power of two
    ///   of at least 4, or `order` is zero or larger than `fft_size/4 + 1`
    pub fn new(fft_size: usize, order: usize) -> Result<Self> {
        if fft_size < 4 || !fft_size.is_power_of_two() {
            return Err(EngineError::config(format!(
                "cepstrum needs a power-of-two FFT size of at least 4, got {fft_size}"
            )));
        }
        let max_order = fft_size / 4 + 1;
        if order == 0 || order > max_order {
            return Err(EngineError::config(format!(
                "cepstral order must be within 1..={max_order}, got {order}"
            )));
        }
        Ok(Self {
            order,
            fft: Fft::new(fft_size / 2)?,
        })
    }

    /// Number of coefficients produced.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Computes the cepstrum of a log-magnitude spectrum.
    ///
    /// # Arguments
    /// * `log_spectrum` - `fft_size/2 + 1` finite dB values
    ///
    /// # Returns
    /// * `Ok(cepstrum)` - Real parts of coefficients `0..order`
    /// * `Err(EngineError::FrameLengthMismatch)` - Spectrum of another FFT size
    /// * `Err(EngineError::NonFiniteInput)` - A silent bin was not floored
    pub fn extract(&self, log_spectrum: &LogMagnitudeSpectrum) -> Result<CepstrumVector> {
        EngineError::check_frame_len(self.fft.size() + 1, log_spectrum.len())?;
        if let Some(index) = log_spectrum.first_non_finite() {
            return Err(EngineError::NonFiniteInput {
                context: "log-magnitude spectrum",
                index,
            });
        }

        let truncated = &log_spectrum.as_slice()[..self.fft.size()];
        let coefficients = self.fft.forward_real(truncated)?;

        Ok(CepstrumVector(
            coefficients.iter().take(self.order).map(|c| c.re).collect(),
        ))
    }
}
