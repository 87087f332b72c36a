//! # Streaming Module
//!
//! Feeds audio that arrives in arbitrary chunks through an [`Engine`].
//! Samples accumulate in a buffer; whenever a full frame is available it is
//! analyzed and handed to a [`FrameSink`], then the buffer advances by one
//! hop.
//!
//! A frame is emitted once the sample following it has arrived, so a
//! stream produces exactly the frames that batch segmentation of the same
//! samples would.

use crossbeam_channel::Sender;

use crate::engine::{Engine, FrameAnalysis};
use crate::error::{EngineError, Result};

/// Receives per-frame results in arrival order.
pub trait FrameSink {
    /// Delivers one result.
    ///
    /// # Returns
    /// * `Err(EngineError::SinkDisconnected)` - The consumer is gone
    fn deliver(&mut self, analysis: FrameAnalysis) -> Result<()>;
}

impl FrameSink for Vec<FrameAnalysis> {
    fn deliver(&mut self, analysis: FrameAnalysis) -> Result<()> {
        self.push(analysis);
        Ok(())
    }
}

impl FrameSink for Sender<FrameAnalysis> {
    fn deliver(&mut self, analysis: FrameAnalysis) -> Result<()> {
        self.send(analysis).map_err(|_| EngineError::SinkDisconnected)
    }
}

/// Adapts a closure into a [`FrameSink`].
pub struct FnSink<F>(pub F);

impl<F> FrameSink for FnSink<F>
where
    F: FnMut(FrameAnalysis),
{
    fn deliver(&mut self, analysis: FrameAnalysis) -> Result<()> {
        (self.0)(analysis);
        Ok(())
    }
}

/// Cuts a chunked sample stream into overlapping frames.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    frame_len: usize,
    hop: usize,
    buffer: Vec<f64>,
    /// Stream position of `buffer[0]`.
    offset: u64,
    /// Samples still to discard before the next frame starts.
    skip: usize,
}

impl FrameAssembler {
    /// Creates an assembler.
    ///
    /// # Returns
    /// * `Err(EngineError::InvalidConfig)` - `frame_len` or `hop` is zero
    pub fn new(frame_len: usize, hop: usize) -> Result<Self> {
        if frame_len == 0 || hop == 0 {
            return Err(EngineError::config(format!(
                "frame and hop must be positive: frame = {frame_len}, hop = {hop}"
            )));
        }
        Ok(Self {
            frame_len,
            hop,
            buffer: Vec::with_capacity(frame_len * 2),
            offset: 0,
            skip: 0,
        })
    }

    /// Appends `chunk` and calls `emit(position, frame)` for every frame it
    /// completes.
    ///
    /// Stops at the first error from `emit`; the failed frame is not
    /// re-emitted.
    pub fn push<E>(&mut self, chunk: &[f64], mut emit: E) -> Result<()>
    where
        E: FnMut(u64, &[f64]) -> Result<()>,
    {
        self.buffer.extend_from_slice(chunk);
        loop {
            if self.skip > 0 {
                let n = self.skip.min(self.buffer.len());
                self.buffer.drain(..n);
                self.skip -= n;
                self.offset += n as u64;
                if self.skip > 0 {
                    return Ok(());
                }
            }

            if self.buffer.len() <= self.frame_len {
                return Ok(());
            }
            self.skip = self.hop;
            emit(self.offset, &self.buffer[..self.frame_len])?;
        }
    }

    /// Samples buffered but not yet discarded.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Stream position of the next frame to be emitted.
    pub fn next_position(&self) -> u64 {
        self.offset + self.skip as u64
    }

    /// Drops buffered samples and restarts positions at zero.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.offset = 0;
        self.skip = 0;
    }
}

/// Couples an [`Engine`] with a sink for live analysis.
pub struct StreamingAnalyzer<S> {
    engine: Engine,
    assembler: FrameAssembler,
    sink: S,
}

impl<S: FrameSink> StreamingAnalyzer<S> {
    /// Creates an analyzer that frames with the engine's geometry.
    pub fn new(engine: Engine, sink: S) -> Result<Self> {
        let assembler = FrameAssembler::new(engine.frame_size(), engine.hop_size())?;
        Ok(Self {
            engine,
            assembler,
            sink,
        })
    }

    /// Analyzes every frame completed by `chunk`.
    ///
    /// # Returns
    /// * `Ok(n)` - Number of frames delivered
    /// * `Err(EngineError::SinkDisconnected)` - The sink went away
    pub fn push(&mut self, chunk: &[f64]) -> Result<usize> {
        let Self {
            engine,
            assembler,
            sink,
        } = self;
        let mut delivered = 0;
        assembler.push(chunk, |position, frame| {
            sink.deliver(engine.on_frame(frame, position)?)?;
            delivered += 1;
            Ok(())
        })?;
        Ok(delivered)
    }

    /// The engine doing the analysis.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Mutable access, e.g. to install models mid-stream.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// The sink receiving results.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Restarts the stream at position zero.
    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    /// Consumes the analyzer, returning the engine and the sink.
    pub fn into_parts(self) -> (Engine, S) {
        (self.engine, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::frames::Frames;

    fn collect(assembler: &mut FrameAssembler, samples: &[f64], chunk: usize) -> Vec<(u64, Vec<f64>)> {
        let mut out = Vec::new();
        for piece in samples.chunks(chunk) {
            assembler
                .push(piece, |pos, frame| {
                    out.push((pos, frame.to_vec()));
                    Ok(())
                })
                .unwrap();
        }
        out
    }

    #[test]
    fn matches_batch_segmentation_for_any_chunking() {
        let samples: Vec<f64> = (0..1000u32).map(f64::from).collect();
        for (frame_len, hop) in [(100, 50), (64, 64), (30, 45)] {
            let batch: Vec<(u64, Vec<f64>)> = Frames::new(&samples, frame_len, hop)
                .unwrap()
                .positioned()
                .map(|(pos, frame)| (pos as u64, frame.to_vec()))
                .collect();
            for chunk in [1, 7, 128, 1000] {
                let mut assembler = FrameAssembler::new(frame_len, hop).unwrap();
                assert_eq!(
                    collect(&mut assembler, &samples, chunk),
                    batch,
                    "frame {frame_len}, hop {hop}, chunk {chunk}"
                );
            }
        }
    }

    #[test]
    fn waits_for_sample_after_frame() {
        let mut assembler = FrameAssembler::new(4, 2).unwrap();
        assert!(collect(&mut assembler, &[1.0; 4], 4).is_empty());
        let frames = collect(&mut assembler, &[1.0], 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(assembler.next_position(), 2);
        assembler.reset();
        assert_eq!(assembler.pending(), 0);
        assert_eq!(assembler.next_position(), 0);
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(FrameAssembler::new(0, 1).is_err());
        assert!(FrameAssembler::new(4, 0).is_err());
    }

    #[test]
    fn closure_sink_counts_frames() {
        let engine = Engine::new(EngineConfig::default(), 8000).unwrap();
        let mut seen = Vec::new();
        let mut analyzer = StreamingAnalyzer::new(engine, FnSink(|a: FrameAnalysis| seen.push(a.position))).unwrap();
        let delivered = analyzer.push(&[0.0; 1000]).unwrap();
        drop(analyzer);
        // 200-sample frames, 100-sample hop
        assert_eq!(delivered, 8);
        assert_eq!(seen, vec![0, 100, 200, 300, 400, 500, 600, 700]);
    }

    #[test]
    fn disconnected_channel_is_reported() {
        let engine = Engine::new(EngineConfig::default(), 8000).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let mut analyzer = StreamingAnalyzer::new(engine, tx).unwrap();
        assert!(matches!(
            analyzer.push(&[0.0; 400]),
            Err(EngineError::SinkDisconnected)
        ));
    }
}
