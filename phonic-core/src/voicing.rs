//! # Voicing Gate Module
//!
//! Cheap per-frame heuristics that decide whether a frame is worth a pitch
//! estimate at all: silent frames fall below an RMS level, noisy frames
//! cross zero too often.

/// RMS level floor in dB reported for an all-zero frame.
pub const SILENCE_DB: f64 = -300.0;

/// Root-mean-square amplitude of a frame (0 for an empty frame).
pub fn rms(frame: &[f64]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|&s| s * s).sum::<f64>() / frame.len() as f64).sqrt()
}

/// RMS level in dB (`20 * log10(rms)`), never below [`SILENCE_DB`].
pub fn rms_db(frame: &[f64]) -> f64 {
    let level = rms(frame);
    if level > 0.0 {
        (20.0 * level.log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

/// Number of sign changes between consecutive samples.
pub fn zero_crossings(frame: &[f64]) -> usize {
    frame
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count()
}

/// Outcome of the voicing gate for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Voicing {
    /// The frame passed both checks.
    Voiced,
    /// The frame's RMS level was below the threshold.
    Silent {
        /// Measured level in dB.
        rms_db: f64,
    },
    /// The frame crossed zero more often than allowed.
    Noisy {
        /// Measured zero-crossing count.
        crossings: usize,
    },
}

impl Voicing {
    /// True when pitch estimation should run.
    pub fn is_voiced(&self) -> bool {
        matches!(self, Voicing::Voiced)
    }
}

/// Silence and noise rejection thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoicingGate {
    /// Frames quieter than this (dB) are silent.
    pub rms_threshold_db: f64,
    /// Frames with more crossings than this are noise.
    pub max_zero_crossings: usize,
}

impl VoicingGate {
    /// Creates a gate with the given thresholds.
    pub fn new(rms_threshold_db: f64, max_zero_crossings: usize) -> Self {
        Self {
            rms_threshold_db,
            max_zero_crossings,
        }
    }

    /// Classifies a frame; silence is checked before noise.
    pub fn check(&self, frame: &[f64]) -> Voicing {
        let level = rms_db(frame);
        if level < self.rms_threshold_db {
            return Voicing::Silent { rms_db: level };
        }
        let crossings = zero_crossings(frame);
        if crossings > self.max_zero_crossings {
            return Voicing::Noisy { crossings };
        }
        Voicing::Voiced
    }
}
