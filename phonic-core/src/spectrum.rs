//! # Spectral Analysis Module
//!
//! Turns a time-domain frame into its complex spectrum and log-magnitude
//! spectrum. The frame is zero-padded to the next power of two and each
//! sample is divided by the original (unpadded) frame length before the
//! transform, so spectra of different frame lengths share a scale.

use rustfft::num_complex::Complex;

use crate::error::{EngineError, Result};
use crate::fft::{Fft, Window};

/// Complex spectrum of one frame, DC to Nyquist.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    bins: Vec<Complex<f64>>,
    fft_size: usize,
}

impl Spectrum {
    /// The `fft_size/2 + 1` complex bins.
    pub fn bins(&self) -> &[Complex<f64>] {
        &self.bins
    }

    /// Transform length the spectrum was computed with.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// True when the spectrum holds no bins.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Centre frequency in Hz of bin `k`.
    pub fn bin_frequency(&self, k: usize, sample_rate: u32) -> f64 {
        k as f64 * f64::from(sample_rate) / self.fft_size as f64
    }

    /// Magnitude of every bin.
    pub fn magnitudes(&self) -> Vec<f64> {
        self.bins.iter().map(|c| c.norm()).collect()
    }

    /// `20 * log10(|c|)` per bin. Silent bins come out as negative infinity.
    pub fn log_magnitude(&self) -> LogMagnitudeSpectrum {
        LogMagnitudeSpectrum(self.bins.iter().map(|c| 20.0 * c.norm().log10()).collect())
    }

    /// `20 * log10(max(|c|, floor))` per bin; always finite for a positive floor.
    pub fn log_magnitude_floored(&self, floor: f64) -> LogMagnitudeSpectrum {
        LogMagnitudeSpectrum(
            self.bins
                .iter()
                .map(|c| 20.0 * c.norm().max(floor).log10())
                .collect(),
        )
    }
}

/// Log-magnitude spectrum in dB, one value per spectrum bin.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMagnitudeSpectrum(Vec<f64>);

impl LogMagnitudeSpectrum {
    /// Wraps precomputed dB values.
    pub fn from_db(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// The dB values.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Consumes the spectrum, returning the dB values.
    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the spectrum holds no bins.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the first NaN or infinite value, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.0.iter().position(|v| !v.is_finite())
    }
}

/// Computes spectra of frames with a fixed length.
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    frame_len: usize,
    fft: Fft,
    window: Window,
    /// Window weights divided by their sum.
    weights: Vec<f64>,
}

impl SpectralAnalyzer {
    /// Creates an analyzer for frames of `frame_len` samples.
    pub fn new(frame_len: usize) -> Result<Self> {
        if frame_len == 0 {
            return Err(EngineError::config("frame length must be positive"));
        }
        Ok(Self {
            frame_len,
            fft: Fft::for_frame(frame_len)?,
            window: Window::Rectangular,
            weights: unit_gain(Window::Rectangular, frame_len),
        })
    }

    /// Applies `window` to every frame before it is transformed.
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self.weights = unit_gain(window, self.frame_len);
        self
    }

    /// Window in use.
    pub fn window(&self) -> Window {
        self.window
    }

    /// Frame length this analyzer accepts.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Zero-padded transform length.
    pub fn fft_size(&self) -> usize {
        self.fft.size()
    }

    /// Computes the spectrum of one frame.
    ///
    /// This function:
    /// 1. Weights the frame by the configured window (none by default)
    /// 2. Divides by the sum of the window weights, which is the unpadded
    ///    frame length for the rectangular window
    /// 3. Zero-pads to the FFT size and runs the forward real FFT
    ///
    /// # Arguments
    /// * `frame` - Exactly `frame_len` samples
    ///
    /// # Returns
    /// * `Ok(spectrum)` - `fft_size/2 + 1` complex bins
    /// * `Err(EngineError::FrameLengthMismatch)` - Wrong frame length
    pub fn analyze(&self, frame: &[f64]) -> Result<Spectrum> {
        EngineError::check_frame_len(self.frame_len, frame.len())?;

        let src: Vec<f64> = frame
            .iter()
            .zip(&self.weights)
            .map(|(&x, &w)| x * w)
            .collect();

        Ok(Spectrum {
            bins: self.fft.forward_real(&src)?,
            fft_size: self.fft.size(),
        })
    }
}

/// Window weights scaled so they sum to one.
fn unit_gain(window: Window, frame_len: usize) -> Vec<f64> {
    let weights = window.coefficients(frame_len);
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}
