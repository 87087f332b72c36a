//! # Analysis Engine Module
//!
//! The configured pipeline. An [`Engine`] owns every per-frame stage built
//! for one sample rate and configuration, plus the class models once they
//! have been trained or loaded.
//!
//! ## Features
//! - Batch operations over whole waveforms (recognition, pitch tracks,
//!   spectrograms, chord sequences)
//! - Per-frame operations for callers that segment audio themselves
//! - A streaming callback ([`Engine::on_frame`]) producing [`FrameAnalysis`]
//! - Training from labelled reference waveforms, or loading a [`ModelSet`]

use tracing::{Span, debug, info, info_span};

use crate::cepstrum::{CepstrumExtractor, CepstrumVector};
use crate::chord::{self, ChordEstimate};
use crate::classify::{ClassificationResult, GaussianClassifier};
use crate::config::{EngineConfig, FrameGeometry};
use crate::error::{EngineError, Result};
use crate::fft::Window;
use crate::frames::Frames;
use crate::model::{ClassModel, GaussianTrainer, ModelSet};
use crate::notes::{self, Note};
use crate::pitch::{AutocorrelationPitchEstimator, PitchEstimate};
use crate::spectrum::{LogMagnitudeSpectrum, SpectralAnalyzer, Spectrum};
use crate::voicing::{self, Voicing, VoicingGate};

/// Everything the engine reports for one streamed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    /// Sample index at which the frame starts.
    pub position: u64,
    /// Start time of the frame in seconds.
    pub time: f64,
    /// Classification, when models are available.
    pub classification: Option<ClassificationResult>,
    /// Label of the winning class, when models are available.
    pub label: Option<String>,
    /// Pitch estimate; unvoiced when the voicing gate rejected the frame.
    pub pitch: PitchEstimate,
    /// Nearest note to a voiced pitch.
    pub note: Option<Note>,
    /// RMS level in dB.
    pub rms_db: f64,
    /// Voicing gate decision.
    pub voicing: Voicing,
    /// Floored log-magnitude spectrum of the frame.
    pub log_spectrum: LogMagnitudeSpectrum,
}

/// The configured analysis pipeline for one sample rate.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    geometry: FrameGeometry,
    analyzer: SpectralAnalyzer,
    display: SpectralAnalyzer,
    extractor: CepstrumExtractor,
    pitch: AutocorrelationPitchEstimator,
    gate: VoicingGate,
    trainer: GaussianTrainer,
    classifier: Option<GaussianClassifier>,
    span: Span,
}

impl Engine {
    /// Builds an engine for `sample_rate`.
    ///
    /// # Arguments
    /// * `config` - Analysis parameters
    /// * `sample_rate` - Sample rate of every waveform and frame, in Hz
    ///
    /// # Returns
    /// * `Ok(engine)` - Ready for every operation except classification
    /// * `Err(EngineError::InvalidConfig)` - The configuration cannot be used
    ///   at this sample rate
    pub fn new(config: EngineConfig, sample_rate: u32) -> Result<Self> {
        let geometry = FrameGeometry::new(&config, sample_rate)?;
        let span = info_span!(
            "phonic_engine",
            sample_rate,
            frame_size = geometry.frame_size,
            hop_size = geometry.hop_size
        );

        let analyzer = SpectralAnalyzer::new(geometry.frame_size)?;
        let display = SpectralAnalyzer::new(geometry.frame_size)?.with_window(config.spectrum_window);
        let extractor = CepstrumExtractor::new(geometry.fft_size, config.cepstral_order)?;
        let pitch = AutocorrelationPitchEstimator::new(
            sample_rate,
            geometry.frame_size,
            config.pitch_lower_bound,
            config.pitch_upper_bound,
            config.autocorrelation,
        )?;
        let gate = VoicingGate::new(
            config.voicing_rms_threshold_db,
            config.voicing_max_zero_crossings,
        );
        let trainer = GaussianTrainer::new(config.cepstral_order, config.variance, config.std_floor)?;

        span.in_scope(|| {
            info!(
                fft_size = geometry.fft_size,
                cepstral_order = config.cepstral_order,
                autocorrelation = ?config.autocorrelation,
                "engine configured"
            );
        });

        Ok(Self {
            config,
            geometry,
            analyzer,
            display,
            extractor,
            pitch,
            gate,
            trainer,
            classifier: None,
            span,
        })
    }

    /// Replaces the span entered by batch operations.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The span entered by batch operations.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The configuration this engine was built from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Frame, hop and FFT sizes.
    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// Samples per frame.
    pub fn frame_size(&self) -> usize {
        self.geometry.frame_size
    }

    /// Samples between frame starts.
    pub fn hop_size(&self) -> usize {
        self.geometry.hop_size
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.geometry.sample_rate
    }

    /// Segments `samples` into this engine's frames.
    pub fn frames<'a>(&self, samples: &'a [f64]) -> Result<Frames<'a>> {
        Frames::new(samples, self.geometry.frame_size, self.geometry.hop_size)
    }

    /// Unwindowed spectrum of one frame.
    pub fn spectrum(&self, frame: &[f64]) -> Result<Spectrum> {
        self.analyzer.analyze(frame)
    }

    /// Floored log-magnitude spectrum of one frame, as fed to the cepstrum.
    pub fn log_spectrum(&self, frame: &[f64]) -> Result<LogMagnitudeSpectrum> {
        Ok(self
            .analyzer
            .analyze(frame)?
            .log_magnitude_floored(self.config.magnitude_floor))
    }

    /// Cepstral feature vector of one frame.
    pub fn cepstrum(&self, frame: &[f64]) -> Result<CepstrumVector> {
        self.extractor.extract(&self.log_spectrum(frame)?)
    }

    /// Fits one class model from a reference waveform.
    ///
    /// Does not change the engine's current models.
    ///
    /// # Returns
    /// * `Err(EngineError::InsufficientData)` - The waveform yields no frame
    pub fn train_class(&self, label: &str, waveform: &[f64]) -> Result<ClassModel> {
        let _guard = self.span.enter();
        let frames = self.frames(waveform)?;
        if frames.total() == 0 {
            return Err(EngineError::InsufficientData {
                label: label.to_string(),
                samples: waveform.len(),
                frame_size: self.geometry.frame_size,
            });
        }

        let cepstra = frames
            .map(|frame| self.cepstrum(frame))
            .collect::<Result<Vec<_>>>()?;
        let model = self.trainer.fit(label, &cepstra)?;
        info!(label, frames = cepstra.len(), "class trained");
        Ok(model)
    }

    /// Trains one class per reference, in order, and installs the result.
    ///
    /// Class `i` of the returned set corresponds to `references[i]`. On error
    /// the previously installed models are kept.
    ///
    /// # Returns
    /// * `Ok(models)` - The newly installed model set
    /// * `Err(EngineError::NoTrainingData)` - `references` is empty
    /// * `Err(EngineError::InsufficientData)` - A reference is too short
    pub fn train<L, W>(&mut self, references: &[(L, W)]) -> Result<ModelSet>
    where
        L: AsRef<str>,
        W: AsRef<[f64]>,
    {
        if references.is_empty() {
            return Err(EngineError::NoTrainingData);
        }
        let classes = references
            .iter()
            .map(|(label, waveform)| self.train_class(label.as_ref(), waveform.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let set = ModelSet {
            sample_rate: self.geometry.sample_rate,
            frame_size: self.geometry.frame_size,
            cepstral_order: self.config.cepstral_order,
            classes,
        };
        self.classifier = Some(GaussianClassifier::new(set.classes.clone())?);
        self.span.in_scope(|| info!(classes = set.classes.len(), "models installed"));
        Ok(set)
    }

    /// Installs previously trained models.
    ///
    /// # Returns
    /// * `Err(EngineError::ModelMismatch)` - The set was trained with another
    ///   sample rate, frame size or cepstral order
    pub fn set_models(&mut self, models: ModelSet) -> Result<()> {
        models.validate()?;
        if models.sample_rate != self.geometry.sample_rate
            || models.frame_size != self.geometry.frame_size
            || models.cepstral_order != self.config.cepstral_order
        {
            return Err(EngineError::model_mismatch(format!(
                "models expect {} Hz, frame {} and order {}; engine has {} Hz, frame {} and order {}",
                models.sample_rate,
                models.frame_size,
                models.cepstral_order,
                self.geometry.sample_rate,
                self.geometry.frame_size,
                self.config.cepstral_order
            )));
        }
        self.classifier = Some(GaussianClassifier::new(models.classes)?);
        Ok(())
    }

    /// The installed models, if any.
    pub fn models(&self) -> Option<ModelSet> {
        self.classifier.as_ref().map(|classifier| ModelSet {
            sample_rate: self.geometry.sample_rate,
            frame_size: self.geometry.frame_size,
            cepstral_order: self.config.cepstral_order,
            classes: classifier.models().to_vec(),
        })
    }

    /// Label string of class `index` in the installed models.
    pub fn label_name(&self, index: usize) -> Option<&str> {
        self.classifier.as_ref()?.label_name(index)
    }

    /// Classifies one frame.
    ///
    /// # Returns
    /// * `Err(EngineError::NoModels)` - Nothing trained or loaded yet
    pub fn classify_frame(&self, frame: &[f64]) -> Result<ClassificationResult> {
        let classifier = self.classifier.as_ref().ok_or(EngineError::NoModels)?;
        classifier.classify(&self.cepstrum(frame)?)
    }

    /// Classifies every frame of `samples`.
    pub fn recognize(&self, samples: &[f64]) -> Result<Vec<ClassificationResult>> {
        let _guard = self.span.enter();
        if self.classifier.is_none() {
            return Err(EngineError::NoModels);
        }
        let results = self
            .frames(samples)?
            .map(|frame| self.classify_frame(frame))
            .collect::<Result<Vec<_>>>()?;
        debug!(frames = results.len(), "recognized");
        Ok(results)
    }

    /// Pitch of one frame, without the voicing gate.
    pub fn estimate_pitch(&self, frame: &[f64]) -> Result<PitchEstimate> {
        self.pitch.estimate(frame)
    }

    /// Pitch of every frame of `samples`, without the voicing gate.
    pub fn pitch_track(&self, samples: &[f64]) -> Result<Vec<PitchEstimate>> {
        let _guard = self.span.enter();
        let track = self
            .frames(samples)?
            .map(|frame| self.pitch.estimate(frame))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            frames = track.len(),
            voiced = track.iter().filter(|p| p.is_voiced()).count(),
            "pitch tracked"
        );
        Ok(track)
    }

    /// Floored log spectrum of one frame with the display window applied.
    ///
    /// The window is scaled to unit sum, so a tone reads the same level
    /// whichever window is configured.
    pub fn display_spectrum(&self, frame: &[f64]) -> Result<LogMagnitudeSpectrum> {
        Ok(self
            .display
            .analyze(frame)?
            .log_magnitude_floored(self.config.magnitude_floor))
    }

    /// Display spectra of every frame of `samples`.
    pub fn spectrogram(&self, samples: &[f64]) -> Result<Vec<LogMagnitudeSpectrum>> {
        let _guard = self.span.enter();
        self.frames(samples)?
            .map(|frame| self.display_spectrum(frame))
            .collect()
    }

    /// Best-matching triad of one frame.
    pub fn chord_frame(&self, frame: &[f64]) -> Result<ChordEstimate> {
        let spectrum = self.display.analyze(frame)?;
        Ok(chord::recognize(&spectrum, self.geometry.sample_rate))
    }

    /// Best-matching triad of every frame of `samples`.
    pub fn chords(&self, samples: &[f64]) -> Result<Vec<ChordEstimate>> {
        let _guard = self.span.enter();
        self.frames(samples)?
            .map(|frame| self.chord_frame(frame))
            .collect()
    }

    /// Full analysis of one streamed frame.
    ///
    /// Pitch is only estimated when the voicing gate accepts the frame;
    /// classification only runs when models are installed.
    ///
    /// # Arguments
    /// * `frame` - Exactly `frame_size` samples
    /// * `position` - Sample index of the frame's first sample in the stream
    pub fn on_frame(&self, frame: &[f64], position: u64) -> Result<FrameAnalysis> {
        let spectrum = self.analyzer.analyze(frame)?;
        let floored = spectrum.log_magnitude_floored(self.config.magnitude_floor);

        let classification = match &self.classifier {
            Some(classifier) => Some(classifier.classify(&self.extractor.extract(&floored)?)?),
            None => None,
        };
        let label = classification
            .as_ref()
            .and_then(|c| self.label_name(c.label))
            .map(str::to_string);

        let voicing = self.gate.check(frame);
        let pitch = if voicing.is_voiced() {
            self.pitch.estimate(frame)?
        } else {
            PitchEstimate::Unvoiced
        };
        let note = pitch.frequency().and_then(notes::nearest_note);
        let rms_db = voicing::rms_db(frame);

        let log_spectrum = match self.config.spectrum_window {
            Window::Rectangular => floored,
            Window::Hann => self.display_spectrum(frame)?,
        };

        debug!(
            parent: &self.span,
            position,
            label = label.as_deref(),
            pitch = pitch.hz(),
            rms_db,
            "frame analyzed"
        );

        Ok(FrameAnalysis {
            position,
            time: self.geometry.seconds(position),
            classification,
            label,
            pitch,
            note,
            rms_db,
            voicing,
            log_spectrum,
        })
    }
}
