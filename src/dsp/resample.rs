//! Rational-rate linear-interpolation resampler (component E).

use crate::buffer::{BufferPool, RealBuffer};

/// Resamples a real-valued stream from `input_rate` to `output_rate` by
/// linear interpolation between adjacent input samples, chunking emitted
/// output into pooled buffers of `chunk_size` and handing each to a
/// registered listener as it fills. Retained input history is bounded by
/// `buffer_size` samples; a call that would grow history past that bound
/// drops the oldest unconsumed samples instead of growing without limit.
pub struct RealResampler {
    step: f64,
    buffer_size: usize,
    chunk_size: usize,
    history: Vec<f32>,
    position: f64,
    pool: BufferPool<f32>,
    listener: Option<Box<dyn FnMut(RealBuffer)>>,
}

impl RealResampler {
    pub fn new(input_rate: f64, output_rate: f64, buffer_size: usize, chunk_size: usize) -> Self {
        Self {
            step: input_rate / output_rate,
            buffer_size,
            chunk_size,
            history: Vec::new(),
            position: 0.0,
            pool: BufferPool::new(),
            listener: None,
        }
    }

    pub fn set_listener(&mut self, listener: impl FnMut(RealBuffer) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn remove_listener(&mut self) {
        self.listener = None;
    }

    /// Feed `input` samples through the resampler, invoking the listener
    /// once per full chunk and once more for any partial tail.
    pub fn resample(&mut self, input: &[f32]) {
        self.history.extend_from_slice(input);
        if self.history.len() > self.buffer_size {
            let drop = self.history.len() - self.buffer_size;
            self.history.drain(0..drop);
            self.position = (self.position - drop as f64).max(0.0);
        }

        let mut out = Vec::with_capacity(self.chunk_size);
        while (self.position.floor() as usize) + 1 < self.history.len() {
            let idx = self.position.floor() as usize;
            let frac = (self.position - idx as f64) as f32;
            let sample = self.history[idx] * (1.0 - frac) + self.history[idx + 1] * frac;
            out.push(sample);
            self.position += self.step;

            if out.len() == self.chunk_size {
                self.flush(&mut out);
            }
        }
        if !out.is_empty() {
            self.flush(&mut out);
        }

        let consumed = (self.position.floor() as usize).min(self.history.len());
        self.history.drain(0..consumed);
        self.position -= consumed as f64;
    }

    fn flush(&mut self, out: &mut Vec<f32>) {
        if let Some(listener) = self.listener.as_mut() {
            let mut buffer = self.pool.acquire(out.len());
            buffer.samples_mut().copy_from_slice(out);
            listener(buffer);
        }
        out.clear();
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.position = 0.0;
    }
}
