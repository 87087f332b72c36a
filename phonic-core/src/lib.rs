// phonic-core/src/lib.rs

//! The core logic for frame-based acoustic analysis.
//! This crate segments waveforms into overlapping frames, extracts cepstral
//! features, trains and applies per-class Gaussian models, and estimates
//! pitch by autocorrelation. It is completely headless and performs no
//! audio I/O; callers supply sample buffers and consume result values.

pub mod cepstrum;
pub mod chord;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod fft;
pub mod frames;
pub mod model;
pub mod notes;
pub mod pitch;
pub mod spectrum;
pub mod stream;
pub mod voicing;

pub use cepstrum::{CepstrumExtractor, CepstrumVector};
pub use chord::ChordEstimate;
pub use classify::{ClassificationResult, GaussianClassifier};
pub use config::{EngineConfig, FrameGeometry};
pub use engine::{Engine, FrameAnalysis};
pub use error::{EngineError, Result};
pub use fft::Window;
pub use frames::Frames;
pub use model::{ClassModel, GaussianTrainer, ModelSet, VarianceMethod};
pub use notes::Note;
pub use pitch::{AutocorrelationMethod, AutocorrelationPitchEstimator, PitchEstimate};
pub use spectrum::{LogMagnitudeSpectrum, SpectralAnalyzer, Spectrum};
pub use stream::{FnSink, FrameAssembler, FrameSink, StreamingAnalyzer};
pub use voicing::{Voicing, VoicingGate};
