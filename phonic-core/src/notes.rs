//! # Musical Note Module
//!
//! Converts pitch estimates to equal-tempered note numbers and names so
//! front-ends can label a voiced frame ("A4", 3 cents sharp) without
//! re-deriving the tuning math.
//!
//! ## Features
//! - MIDI note numbering (A4 = 69 = 440 Hz)
//! - Note names with octave, C-based octaves (C4 = 60)
//! - Cent deviation calculations

use once_cell::sync::Lazy;

/// Reference pitch of A4 in Hz.
pub const A4_HZ: f64 = 440.0;
/// MIDI note number of A4.
pub const A4_NOTE: i32 = 69;

/// Pitch-class names, index 0 = C.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Names of MIDI notes 0..=127, computed once.
static NOTE_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    (0..128)
        .map(|n: i32| format!("{}{}", PITCH_CLASSES[(n % 12) as usize], n / 12 - 1))
        .collect()
});

/// Fractional MIDI note number of a frequency: `69 + 12·log2(f/440)`.
pub fn hz_to_note_number(freq: f64) -> f64 {
    f64::from(A4_NOTE) + 12.0 * (freq / A4_HZ).log2()
}

/// Frequency in Hz of a (possibly fractional) MIDI note number.
pub fn note_number_to_hz(note: f64) -> f64 {
    A4_HZ * 2.0_f64.powf((note - f64::from(A4_NOTE)) / 12.0)
}

/// Name of MIDI note `note` ("A4", "C#3"); `None` outside 0..=127.
pub fn note_name(note: i32) -> Option<&'static str> {
    usize::try_from(note)
        .ok()
        .and_then(|i| NOTE_NAMES.get(i))
        .map(String::as_str)
}

/// Calculates the deviation from a target frequency in cents.
///
/// - 100 cents = 1 semitone
/// - Positive values are sharp, negative values flat
pub fn cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// The equal-tempered note closest to a frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// MIDI note number.
    pub number: i32,
    /// Note name with octave.
    pub name: &'static str,
    /// Exact frequency of the note in Hz.
    pub frequency: f64,
    /// How far the measured frequency is from the note, in cents.
    pub cents: f64,
}

/// Finds the nearest MIDI note to `freq`.
///
/// # Returns
/// * `Some(note)` - Nearest note within MIDI range
/// * `None` - Non-positive or non-finite frequency, or outside 0..=127
pub fn nearest_note(freq: f64) -> Option<Note> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    let number = hz_to_note_number(freq).round() as i32;
    let name = note_name(number)?;
    let frequency = note_number_to_hz(f64::from(number));
    Some(Note {
        number,
        name,
        frequency,
        cents: cents_deviation(freq, frequency),
    })
}
