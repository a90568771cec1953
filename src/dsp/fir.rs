//! Complex FIR channel filter (component B).

use std::collections::VecDeque;

use num_complex::Complex32;

/// Direct-form FIR filter over a complex baseband stream. Retains a delay
/// line between calls so a caller can feed it in arbitrarily sized chunks.
pub struct ComplexFirFilter {
    taps: Vec<f32>,
    history: VecDeque<Complex32>,
}

impl ComplexFirFilter {
    pub fn new(taps: Vec<f32>) -> Self {
        Self {
            taps,
            history: VecDeque::new(),
        }
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Filter `input`, returning one output sample per input sample.
    pub fn filter(&mut self, input: &[Complex32]) -> Vec<Complex32> {
        let mut out = Vec::with_capacity(input.len());
        for &sample in input {
            self.history.push_front(sample);
            self.history.truncate(self.taps.len());

            let mut acc = Complex32::new(0.0, 0.0);
            for (tap, history_sample) in self.taps.iter().zip(self.history.iter()) {
                acc += *history_sample * *tap;
            }
            out.push(acc);
        }
        out
    }

    /// Drop the retained delay line, as on retune.
    pub fn dispose(&mut self) {
        self.history.clear();
    }
}
