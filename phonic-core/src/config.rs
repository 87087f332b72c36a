//! # Configuration Module
//!
//! Analysis parameters shared by every front-end. A configuration is plain
//! data (serializable to JSON); it becomes concrete sample counts only once
//! it is combined with a sample rate in [`FrameGeometry`].
//!
//! ## Features
//! - Serde support with per-field defaults, so partial JSON files are valid
//! - Eager validation: bad values are rejected, never clamped
//! - Frame, hop and FFT sizes derived from durations and the sample rate

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::fft::{self, Window};
use crate::model::VarianceMethod;
use crate::pitch::AutocorrelationMethod;

/// Default frame duration in seconds.
pub const DEFAULT_FRAME_DURATION: f64 = 0.025;
/// Default number of cepstral coefficients kept per frame.
pub const DEFAULT_CEPSTRAL_ORDER: usize = 13;
/// Longest frame or hop, in samples, a geometry may resolve to.
pub const MAX_FRAME_SIZE: usize = 1 << 24;
/// Default pitch plausibility upper bound in Hz.
pub const DEFAULT_PITCH_UPPER_BOUND: f64 = 1000.0;

/// Parameters of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frame duration in seconds (before division by `frame_divisor`).
    pub frame_duration: f64,
    /// Hop between frame starts in seconds; half a frame when absent.
    pub hop_duration: Option<f64>,
    /// Integer sub-division applied to the frame length.
    pub frame_divisor: usize,
    /// Number of cepstral coefficients (K).
    pub cepstral_order: usize,
    /// Estimates below this frequency (Hz) are reported as unvoiced.
    pub pitch_lower_bound: f64,
    /// Estimates above this frequency (Hz) are reported as unvoiced.
    pub pitch_upper_bound: f64,
    /// Streaming frames quieter than this RMS level (dB) skip pitch estimation.
    pub voicing_rms_threshold_db: f64,
    /// Streaming frames with more zero crossings than this skip pitch estimation.
    pub voicing_max_zero_crossings: usize,
    /// How the autocorrelation function is computed.
    pub autocorrelation: AutocorrelationMethod,
    /// How class statistics are accumulated.
    pub variance: VarianceMethod,
    /// Smallest magnitude fed to `log10` when building log spectra.
    pub magnitude_floor: f64,
    /// Smallest standard deviation a class model may hold.
    pub std_floor: f64,
    /// Window applied to frames for spectrogram output.
    pub spectrum_window: Window,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_duration: DEFAULT_FRAME_DURATION,
            hop_duration: None,
            frame_divisor: 1,
            cepstral_order: DEFAULT_CEPSTRAL_ORDER,
            pitch_lower_bound: 0.0,
            pitch_upper_bound: DEFAULT_PITCH_UPPER_BOUND,
            voicing_rms_threshold_db: -50.0,
            voicing_max_zero_crossings: 150,
            autocorrelation: AutocorrelationMethod::Direct,
            variance: VarianceMethod::TwoPass,
            magnitude_floor: 1e-12,
            std_floor: 1e-10,
            spectrum_window: Window::Rectangular,
        }
    }
}

impl EngineConfig {
    /// Checks every value that does not depend on the sample rate.
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_duration.is_finite() && self.frame_duration > 0.0) {
            return Err(EngineError::config(format!(
                "frame duration must be positive: {}",
                self.frame_duration
            )));
        }
        if let Some(hop) = self.hop_duration {
            if !(hop.is_finite() && hop > 0.0) {
                return Err(EngineError::config(format!(
                    "hop duration must be positive: {hop}"
                )));
            }
        }
        if self.frame_divisor == 0 {
            return Err(EngineError::config("frame divisor must be at least 1"));
        }
        if self.cepstral_order == 0 {
            return Err(EngineError::config("cepstral order must be at least 1"));
        }
        if !(self.pitch_lower_bound.is_finite() && self.pitch_lower_bound >= 0.0) {
            return Err(EngineError::config(format!(
                "pitch lower bound must be non-negative: {}",
                self.pitch_lower_bound
            )));
        }
        if !(self.pitch_upper_bound.is_finite() && self.pitch_upper_bound > self.pitch_lower_bound)
        {
            return Err(EngineError::config(format!(
                "pitch upper bound must be larger than lower bound: lower = {}, upper = {}",
                self.pitch_lower_bound, self.pitch_upper_bound
            )));
        }
        if !self.voicing_rms_threshold_db.is_finite() {
            return Err(EngineError::config("voicing RMS threshold must be finite"));
        }
        if !(self.magnitude_floor.is_finite() && self.magnitude_floor > 0.0) {
            return Err(EngineError::config(format!(
                "magnitude floor must be positive: {}",
                self.magnitude_floor
            )));
        }
        if !(self.std_floor.is_finite() && self.std_floor > 0.0) {
            return Err(EngineError::config(format!(
                "std floor must be positive: {}",
                self.std_floor
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_json_str(&data)
            .with_context(|| format!("failed to parse config '{}'", path.display()))
    }

    /// Saves the configuration file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write config '{}'", path.display()))
    }
}

/// Sample counts derived from an [`EngineConfig`] at a given sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per frame.
    pub frame_size: usize,
    /// Samples between frame starts.
    pub hop_size: usize,
    /// Zero-padded transform length.
    pub fft_size: usize,
}

impl FrameGeometry {
    /// Resolves durations into sample counts and checks they are usable.
    ///
    /// # Arguments
    /// * `config` - Validated or unvalidated configuration
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Ok(geometry)` - Frame, hop and FFT sizes
    /// * `Err(EngineError::InvalidConfig)` - Frame too short, hop of zero
    ///   samples, or cepstral order exceeding what the FFT size can provide
    pub fn new(config: &EngineConfig, sample_rate: u32) -> Result<Self> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(EngineError::config("sample rate must be positive"));
        }
        let rate = f64::from(sample_rate);

        let frame_size = samples_for("frame", config.frame_duration, rate)? / config.frame_divisor;
        let hop_size = match config.hop_duration {
            Some(hop) => samples_for("hop", hop, rate)?,
            None => frame_size / 2,
        };
        if frame_size < 4 {
            return Err(EngineError::config(format!(
                "frame of {frame_size} samples is too short (minimum 4)"
            )));
        }
        if hop_size == 0 {
            return Err(EngineError::config("hop resolves to zero samples"));
        }

        let fft_size = fft::fft_size(frame_size);
        let max_order = fft_size / 4 + 1;
        if config.cepstral_order > max_order {
            return Err(EngineError::config(format!(
                "cepstral order {} exceeds {} available for FFT size {}",
                config.cepstral_order, max_order, fft_size
            )));
        }

        Ok(Self {
            sample_rate,
            frame_size,
            hop_size,
            fft_size,
        })
    }

    /// Start time in seconds of the frame beginning at `position`.
    pub fn seconds(&self, position: u64) -> f64 {
        position as f64 / f64::from(self.sample_rate)
    }
}

/// Rounds `seconds * rate` to a sample count no larger than [`MAX_FRAME_SIZE`].
fn samples_for(what: &str, seconds: f64, rate: f64) -> Result<usize> {
    let samples = (seconds * rate).round();
    if !(samples.is_finite() && samples <= MAX_FRAME_SIZE as f64) {
        return Err(EngineError::config(format!(
            "{what} of {seconds} s at {rate} Hz exceeds {MAX_FRAME_SIZE} samples"
        )));
    }
    Ok(samples as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn geometry_for_fifty_millisecond_frames() {
        let config = EngineConfig {
            frame_duration: 0.05,
            ..Default::default()
        };
        let geometry = FrameGeometry::new(&config, 16000).unwrap();
        assert_eq!(geometry.frame_size, 800);
        assert_eq!(geometry.hop_size, 400);
        assert_eq!(geometry.fft_size, 1024);
    }

    #[test]
    fn divisor_and_explicit_hop() {
        let config = EngineConfig {
            frame_duration: 0.2,
            frame_divisor: 8,
            hop_duration: Some(0.01),
            ..Default::default()
        };
        let geometry = FrameGeometry::new(&config, 16000).unwrap();
        assert_eq!(geometry.frame_size, 400);
        assert_eq!(geometry.hop_size, 160);
        assert_eq!(geometry.fft_size, 512);
    }

    #[test]
    fn rejects_inverted_pitch_bounds() {
        let config = EngineConfig {
            pitch_lower_bound: 500.0,
            pitch_upper_bound: 400.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("upper bound"), "got: {err}");
    }

    #[test]
    fn rejects_non_positive_sizes() {
        let zero_frame = EngineConfig {
            frame_duration: 0.0,
            ..Default::default()
        };
        assert!(zero_frame.validate().is_err());

        let negative_hop = EngineConfig {
            hop_duration: Some(-0.01),
            ..Default::default()
        };
        assert!(negative_hop.validate().is_err());

        let tiny_hop = EngineConfig {
            hop_duration: Some(1e-6),
            ..Default::default()
        };
        assert!(FrameGeometry::new(&tiny_hop, 16000).is_err());
    }

    #[test]
    fn rejects_oversized_frames_and_hops() {
        let huge_frame = EngineConfig {
            frame_duration: 1e30,
            ..EngineConfig::default()
        };
        assert!(matches!(
            FrameGeometry::new(&huge_frame, 16000),
            Err(EngineError::InvalidConfig(_))
        ));

        let huge_hop = EngineConfig {
            hop_duration: Some(1e30),
            ..EngineConfig::default()
        };
        assert!(matches!(
            FrameGeometry::new(&huge_hop, 16000),
            Err(EngineError::InvalidConfig(_))
        ));

        let largest = EngineConfig {
            frame_duration: MAX_FRAME_SIZE as f64 / 16000.0,
            ..EngineConfig::default()
        };
        let geometry = FrameGeometry::new(&largest, 16000).unwrap();
        assert_eq!(geometry.frame_size, MAX_FRAME_SIZE);
        assert_eq!(geometry.fft_size, MAX_FRAME_SIZE);
    }

    #[test]
    fn rejects_order_beyond_fft_size() {
        let config = EngineConfig {
            frame_duration: 0.001,
            cepstral_order: 13,
            ..Default::default()
        };
        // 16 samples -> fft 16 -> at most 5 coefficients
        let err = FrameGeometry::new(&config, 16000).unwrap_err();
        assert!(err.to_string().contains("cepstral order"), "got: {err}");
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "frame_duration": 0.05, "autocorrelation": "fft", "variance": "welford" }"#,
        )
        .unwrap();
        assert_eq!(config.frame_duration, 0.05);
        assert_eq!(config.autocorrelation, AutocorrelationMethod::Fft);
        assert_eq!(config.variance, VarianceMethod::Welford);
        assert_eq!(config.cepstral_order, DEFAULT_CEPSTRAL_ORDER);
    }

    #[test]
    fn invalid_json_values_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "cepstral_order": 0 }"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig {
            frame_duration: 0.04,
            spectrum_window: Window::Hann,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }
}
