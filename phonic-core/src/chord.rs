//! # Chord Recognition Module
//!
//! Template matching over a 12-bin chroma vector. The chroma is built by
//! sampling the magnitude spectrum at the equal-tempered frequency of every
//! MIDI note from 36 (C2) to 95 (B6) and folding the notes onto pitch
//! classes. Each of the 24 major and minor triads scores the sum of its
//! three chroma bins.

use once_cell::sync::Lazy;

use crate::classify::argmax;
use crate::notes::{self, PITCH_CLASSES};
use crate::spectrum::Spectrum;

/// Lowest MIDI note folded into the chroma vector.
pub const CHROMA_LOW_NOTE: i32 = 36;
/// One past the highest MIDI note folded into the chroma vector.
pub const CHROMA_HIGH_NOTE: i32 = 96;
/// Number of triad templates.
pub const CHORD_COUNT: usize = 24;

/// Chord names in template order: `C`, `Cm`, `C#`, `C#m`, ...
static CHORD_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    PITCH_CLASSES
        .iter()
        .flat_map(|root| [root.to_string(), format!("{root}m")])
        .collect()
});

/// Name of chord template `index`.
pub fn chord_name(index: usize) -> Option<&'static str> {
    CHORD_NAMES.get(index).map(String::as_str)
}

/// Pitch classes of chord template `index`: even = major, odd = minor.
pub fn chord_tones(index: usize) -> [usize; 3] {
    let root = (index / 2) % 12;
    let third = if index % 2 == 0 { 4 } else { 3 };
    [root, (root + third) % 12, (root + 7) % 12]
}

/// Folds spectrum magnitudes at note frequencies onto 12 pitch classes.
///
/// Notes whose bin lies beyond Nyquist are skipped.
pub fn chroma(spectrum: &Spectrum, sample_rate: u32) -> [f64; 12] {
    let mut cv = [0.0; 12];
    let bins = spectrum.bins();
    let scale = spectrum.fft_size() as f64 / f64::from(sample_rate);
    for note in CHROMA_LOW_NOTE..CHROMA_HIGH_NOTE {
        let bin = (notes::note_number_to_hz(f64::from(note)) * scale).round() as usize;
        if let Some(c) = bins.get(bin) {
            cv[(note % 12) as usize] += c.norm();
        }
    }
    cv
}

/// Best-matching triad of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordEstimate {
    /// Template index (0..24).
    pub index: usize,
    /// Template name.
    pub name: &'static str,
    /// Score of every template.
    pub scores: [f64; CHORD_COUNT],
}

/// Scores all 24 templates against a chroma vector; the first maximum wins.
pub fn recognize_chroma(cv: &[f64; 12]) -> ChordEstimate {
    let mut scores = [0.0; CHORD_COUNT];
    for (i, score) in scores.iter_mut().enumerate() {
        *score = chord_tones(i).iter().map(|&pc| cv[pc]).sum();
    }
    let index = argmax(&scores).unwrap_or(0);
    ChordEstimate {
        index,
        name: chord_name(index).unwrap_or(""),
        scores,
    }
}

/// Chroma extraction followed by template matching.
pub fn recognize(spectrum: &Spectrum, sample_rate: u32) -> ChordEstimate {
    recognize_chroma(&chroma(spectrum, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::SpectralAnalyzer;
    use std::f64::consts::PI;

    fn chord_signal(notes_midi: &[i32], sample_rate: u32, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                notes_midi
                    .iter()
                    .map(|&m| {
                        let f = notes::note_number_to_hz(f64::from(m));
                        (2.0 * PI * f * i as f64 / f64::from(sample_rate)).sin()
                    })
                    .sum::<f64>()
                    / notes_midi.len() as f64
            })
            .collect()
    }

    #[test]
    fn template_names_and_tones() {
        assert_eq!(chord_name(0), Some("C"));
        assert_eq!(chord_name(1), Some("Cm"));
        assert_eq!(chord_name(19), Some("Am"));
        assert_eq!(chord_name(24), None);
        assert_eq!(chord_tones(0), [0, 4, 7]);
        assert_eq!(chord_tones(1), [0, 3, 7]);
        assert_eq!(chord_tones(18), [9, 1, 4]);
    }

    #[test]
    fn chroma_template_match() {
        let mut cv = [0.0; 12];
        cv[9] = 1.0; // A
        cv[0] = 1.0; // C
        cv[4] = 1.0; // E
        let estimate = recognize_chroma(&cv);
        assert_eq!(estimate.name, "Am");
        // C major shares two tones and scores lower
        assert!(estimate.scores[0] < estimate.scores[estimate.index]);
    }

    #[test]
    fn synthetic_c_major_triad() {
        let sample_rate = 16000;
        let analyzer = SpectralAnalyzer::new(8192).unwrap();
        let frame = chord_signal(&[60, 64, 67], sample_rate, 8192);
        let spectrum = analyzer.analyze(&frame).unwrap();
        let estimate = recognize(&spectrum, sample_rate);
        assert_eq!(estimate.name, "C");
    }

    #[test]
    fn silence_falls_back_to_first_template() {
        let analyzer = SpectralAnalyzer::new(256).unwrap();
        let spectrum = analyzer.analyze(&[0.0; 256]).unwrap();
        assert_eq!(recognize(&spectrum, 8000).index, 0);
    }
}
