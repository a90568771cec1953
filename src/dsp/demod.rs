//! FM phase-difference demodulator with embedded power squelch (component C).

use num_complex::Complex32;

use crate::buffer::{BufferPool, RealBuffer};

use super::squelch::PowerSquelch;

pub struct FmDemodulator {
    squelch: PowerSquelch,
    previous: Complex32,
}

impl FmDemodulator {
    pub fn new(alpha: f64, threshold_db: f64, ramp: u32) -> Self {
        Self {
            squelch: PowerSquelch::new(alpha, threshold_db, ramp),
            previous: Complex32::new(0.0, 0.0),
        }
    }

    /// Demodulate `input` into a pooled real-valued buffer, normalized to
    /// [-1, 1] by dividing the phase difference by pi. Feeds each sample's
    /// power into the embedded squelch as a side effect.
    pub fn demodulate(&mut self, input: &[Complex32], pool: &BufferPool<f32>) -> RealBuffer {
        let mut output = pool.acquire(input.len());
        {
            let samples = output.samples_mut();
            for (i, &z) in input.iter().enumerate() {
                let prod = z * self.previous.conj();
                let phase = prod.im.atan2(prod.re);
                samples[i] = (phase as f64 / std::f64::consts::PI) as f32;

                self.squelch.process((z.re * z.re + z.im * z.im) as f64);
                self.previous = z;
            }
        }
        output
    }

    pub fn is_muted(&self) -> bool {
        self.squelch.is_muted()
    }

    pub fn take_squelch_changed(&mut self) -> bool {
        self.squelch.take_changed()
    }

    pub fn power_db(&self) -> f64 {
        self.squelch.power_db()
    }

    pub fn threshold_db(&self) -> f64 {
        self.squelch.threshold_db()
    }

    pub fn reset(&mut self) {
        self.previous = Complex32::new(0.0, 0.0);
        self.squelch.reset();
    }
}
