//! # Frame Segmentation Module
//!
//! Slices a sample buffer into fixed-size, overlapping frames.
//!
//! Frame `i` covers `samples[i * hop .. i * hop + frame_len]` and exists only
//! when `i * hop + frame_len <= samples.len() - 1`. Any incomplete tail is
//! dropped rather than padded, so frame counts and contents match the
//! reference outputs exactly.

use crate::error::{EngineError, Result};

/// Number of frames [`Frames`] yields for a buffer of `len` samples.
pub fn frame_count(len: usize, frame_len: usize, hop: usize) -> usize {
    if frame_len == 0 || hop == 0 || len == 0 || frame_len > len - 1 {
        return 0;
    }
    (len - 1 - frame_len) / hop + 1
}

/// Lazy iterator over the frames of a sample buffer.
///
/// Clones keep their current position; [`Frames::restart`] goes back to the
/// first frame.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    samples: &'a [f64],
    frame_len: usize,
    hop: usize,
    next: usize,
    count: usize,
}

impl<'a> Frames<'a> {
    /// Creates a segmenter over `samples`.
    ///
    /// # Returns
    /// * `Err(EngineError::InvalidConfig)` - `frame_len` or `hop` is zero
    pub fn new(samples: &'a [f64], frame_len: usize, hop: usize) -> Result<Self> {
        if frame_len == 0 {
            return Err(EngineError::config("frame length must be positive"));
        }
        if hop == 0 {
            return Err(EngineError::config("hop length must be positive"));
        }
        Ok(Self {
            samples,
            frame_len,
            hop,
            next: 0,
            count: frame_count(samples.len(), frame_len, hop),
        })
    }

    /// A fresh iterator positioned at the first frame.
    pub fn restart(&self) -> Self {
        Self {
            next: 0,
            ..self.clone()
        }
    }

    /// Sample index at which frame `index` starts.
    pub fn position(&self, index: usize) -> usize {
        index * self.hop
    }

    /// Total number of frames, independent of iteration progress.
    pub fn total(&self) -> usize {
        self.count
    }

    /// Frame length in samples.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Hop length in samples.
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Iterates `(start_position, frame)` pairs.
    pub fn positioned(self) -> impl Iterator<Item = (usize, &'a [f64])> {
        let hop = self.hop;
        let first = self.next;
        self.enumerate().map(move |(i, frame)| ((first + i) * hop, frame))
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a [f64];

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let start = self.next * self.hop;
        self.next += 1;
        Some(&self.samples[start..start + self.frame_len])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn drops_incomplete_tail() {
        let samples = ramp(10);
        let frames: Vec<&[f64]> = Frames::new(&samples, 4, 2).unwrap().collect();
        // starts 0, 2, 4: 4 + 4 = 8 <= 9; start 6 would need sample 9 as well
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(frames[2], &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn frame_never_ends_on_last_sample() {
        let samples = ramp(8);
        assert_eq!(Frames::new(&samples, 8, 4).unwrap().count(), 0);
        assert_eq!(Frames::new(&samples, 7, 4).unwrap().count(), 1);
    }

    #[test]
    fn count_matches_iteration() {
        for len in [0, 1, 5, 16, 17, 100, 1601] {
            for (frame_len, hop) in [(4, 2), (8, 8), (3, 1), (16, 5)] {
                let samples = ramp(len);
                let frames = Frames::new(&samples, frame_len, hop).unwrap();
                assert_eq!(frames.len(), frame_count(len, frame_len, hop));
                assert_eq!(frames.count(), frame_count(len, frame_len, hop));
            }
        }
    }

    #[test]
    fn restart_yields_same_frames() {
        let samples = ramp(50);
        let mut frames = Frames::new(&samples, 10, 5).unwrap();
        let first = frames.next().unwrap().to_vec();
        frames.next();
        let mut again = frames.restart();
        assert_eq!(again.next().unwrap(), first.as_slice());
        assert_eq!(again.len(), frames.total() - 1);
    }

    #[test]
    fn positions_follow_hop() {
        let samples = ramp(16000);
        let positions: Vec<usize> = Frames::new(&samples, 800, 400)
            .unwrap()
            .positioned()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(positions.len(), 38);
        assert_eq!(positions[1], 400);
        assert_eq!(*positions.last().unwrap(), 37 * 400);
    }

    #[test]
    fn rejects_zero_sizes() {
        let samples = ramp(10);
        assert!(Frames::new(&samples, 0, 1).is_err());
        assert!(Frames::new(&samples, 4, 0).is_err());
    }
}
