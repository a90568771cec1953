//! NBFM decoder pipeline (component F): wires the IQ filter, demodulator,
//! squelch, and resampler together and drives the per-channel state events.

use num_complex::Complex32;

use crate::buffer::{BufferPool, ComplexBuffer, RealBuffer};
use crate::config::DecoderConfig;
use crate::dsp::demod::FmDemodulator;
use crate::dsp::fir::ComplexFirFilter;
use crate::dsp::fir_design::{self, LowpassSpec};
use crate::dsp::resample::RealResampler;
use crate::error::{ConfigError, PipelineError};
use crate::events::{DecoderState, DecoderStateEvent, DecoderStateEventKind};

const RESAMPLE_CHUNK_SAMPLES: usize = 1024;
const RESAMPLE_HISTORY_SAMPLES: usize = 4 * RESAMPLE_CHUNK_SAMPLES;

/// Source-level notification the pipeline reacts to. Only a sample-rate
/// change exists today; modeled as an enum so the listener surface can grow
/// without changing `NbfmDecoder`'s public method set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceEvent {
    SampleRateChange(f64),
}

pub struct NbfmDecoder {
    config: DecoderConfig,
    source_id: String,
    filter: Option<ComplexFirFilter>,
    demod: FmDemodulator,
    resampler: Option<RealResampler>,
    configured_rate: Option<f64>,
    squelched: bool,
    pool: BufferPool<f32>,
    state_listener: Option<Box<dyn FnMut(&DecoderStateEvent)>>,
}

impl NbfmDecoder {
    pub fn new(source_id: impl Into<String>, config: DecoderConfig) -> Self {
        let demod = FmDemodulator::new(config.squelch.alpha, config.squelch.threshold_db, config.squelch.ramp);
        Self {
            config,
            source_id: source_id.into(),
            filter: None,
            demod,
            resampler: None,
            configured_rate: None,
            squelched: true,
            pool: BufferPool::new(),
            state_listener: None,
        }
    }

    pub fn set_state_listener(&mut self, listener: impl FnMut(&DecoderStateEvent) + 'static) {
        self.state_listener = Some(Box::new(listener));
    }

    pub fn set_buffer_listener(&mut self, listener: impl FnMut(RealBuffer) + 'static) {
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.set_listener(listener);
        }
    }

    pub fn remove_buffer_listener(&mut self) {
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.remove_listener();
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured_rate.is_some()
    }

    pub fn handle_source_event(&mut self, event: SourceEvent) -> Result<(), ConfigError> {
        match event {
            SourceEvent::SampleRateChange(rate_hz) => self.on_sample_rate_change(rate_hz),
        }
    }

    fn on_sample_rate_change(&mut self, rate_hz: f64) -> Result<(), ConfigError> {
        self.filter = None;

        let minimum = 2.0 * self.config.channel_bandwidth_hz;
        if rate_hz < minimum {
            return Err(ConfigError::SampleRateBelowNyquist { rate: rate_hz, minimum });
        }

        let cutoff = rate_hz / 4.0;
        let spec = LowpassSpec {
            sample_rate: rate_hz,
            pass_edge: cutoff - 500.0,
            stop_edge: cutoff + 500.0,
            pass_ripple: 0.01,
            stop_ripple: 0.028,
        };
        let taps = match fir_design::remez_lowpass(&spec) {
            Ok(taps) => taps,
            Err(err) => {
                log::error!(target: "trunk_core::pipeline", "FIR design failed ({err}), falling back to windowed-sinc");
                fir_design::windowed_sinc_lowpass(&spec)
            }
        };

        self.filter = Some(ComplexFirFilter::new(taps));
        let mut resampler = RealResampler::new(
            rate_hz,
            self.config.output_sample_rate_hz,
            RESAMPLE_HISTORY_SAMPLES,
            RESAMPLE_CHUNK_SAMPLES,
        );
        if let Some(old) = self.resampler.take() {
            drop(old); // listener, if any, is re-attached by the caller after reconfiguration
        }
        resampler.reset();
        self.resampler = Some(resampler);
        self.configured_rate = Some(rate_hz);
        Ok(())
    }

    /// Run one block of IQ samples through filter -> demod -> squelch gate ->
    /// resample, emitting START/CONTINUATION/END state events as the
    /// squelch gate opens and closes.
    pub fn receive(&mut self, mut input: ComplexBuffer) -> Result<(), PipelineError> {
        if self.configured_rate.is_none() {
            input.decrement_user_count();
            return Err(PipelineError::NotConfigured);
        }

        let filter = self
            .filter
            .as_mut()
            .expect("filter is constructed alongside configured_rate");
        let filtered: Vec<Complex32> = filter.filter(input.samples());
        input.decrement_user_count();

        let mut demodulated = self.demod.demodulate(&filtered, &self.pool);

        let squelch_changed = self.demod.take_squelch_changed();
        if self.squelched && squelch_changed {
            self.squelched = false;
            self.emit(DecoderStateEventKind::Start, DecoderState::Call);
        }

        if self.squelched {
            demodulated.decrement_user_count();
            self.emit(DecoderStateEventKind::Continuation, DecoderState::Idle);
        } else {
            if let Some(resampler) = self.resampler.as_mut() {
                resampler.resample(demodulated.samples());
            }
            demodulated.decrement_user_count();
            self.emit(DecoderStateEventKind::Continuation, DecoderState::Call);
        }

        if !self.squelched && self.demod.is_muted() {
            self.squelched = true;
            self.emit(DecoderStateEventKind::End, DecoderState::Idle);
        }

        Ok(())
    }

    pub fn reset(&mut self) {
        self.demod.reset();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
        self.squelched = true;
    }

    /// Tear down filters, resamplers and listeners, as on channel teardown.
    pub fn dispose(&mut self) {
        if let Some(filter) = self.filter.as_mut() {
            filter.dispose();
        }
        self.filter = None;
        self.resampler = None;
        self.state_listener = None;
        self.configured_rate = None;
    }

    fn emit(&mut self, kind: DecoderStateEventKind, state: DecoderState) {
        if let Some(listener) = self.state_listener.as_mut() {
            listener(&DecoderStateEvent::new(self.source_id.clone(), kind, state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn strong_block(pool: &BufferPool<Complex32>, len: usize) -> ComplexBuffer {
        let mut buffer = pool.acquire(len);
        for (i, sample) in buffer.samples_mut().iter_mut().enumerate() {
            *sample = Complex32::from_polar(1.0, i as f32 * 0.1);
        }
        buffer
    }

    #[test]
    fn receive_before_sample_rate_configured_is_an_error() {
        let mut decoder = NbfmDecoder::new("chan-1", DecoderConfig::default());
        let pool = BufferPool::new();
        let buffer = pool.acquire(16);
        assert_eq!(decoder.receive(buffer), Err(PipelineError::NotConfigured));
    }

    #[test]
    fn rate_below_nyquist_minimum_is_rejected() {
        let mut decoder = NbfmDecoder::new("chan-1", DecoderConfig::default());
        let err = decoder.handle_source_event(SourceEvent::SampleRateChange(10_000.0));
        assert!(err.is_err());
        assert!(!decoder.is_configured());
    }

    #[test]
    fn strong_signal_opens_squelch_and_emits_start_then_continuation() {
        let mut decoder = NbfmDecoder::new("chan-1", DecoderConfig::default());
        decoder
            .handle_source_event(SourceEvent::SampleRateChange(48_000.0))
            .unwrap();

        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = Rc::clone(&events);
        decoder.set_state_listener(move |event| events_clone.borrow_mut().push(event.kind));

        let pool = BufferPool::new();
        let buffer = strong_block(&pool, 64);
        decoder.receive(buffer).unwrap();

        let recorded = events.borrow();
        assert!(recorded.contains(&DecoderStateEventKind::Start));
        assert!(recorded.contains(&DecoderStateEventKind::Continuation));
    }
}
