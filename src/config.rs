//! Decoder configuration.

use crate::channel_map::ChannelMap;

/// Whether a channel carries always-on control traffic or is granted on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Standard,
    Traffic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquelchConfig {
    pub alpha: f64,
    pub threshold_db: f64,
    pub ramp: u32,
}

impl Default for SquelchConfig {
    fn default() -> Self {
        Self {
            alpha: 0.0001,
            threshold_db: -78.0,
            ramp: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub channel_bandwidth_hz: f64,
    pub output_sample_rate_hz: f64,
    pub squelch: SquelchConfig,
    pub channel_type: ChannelType,
    pub call_timeout_ms: u64,
    pub channel_map: Option<ChannelMap>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            channel_bandwidth_hz: 12_500.0,
            output_sample_rate_hz: 8_000.0,
            squelch: SquelchConfig::default(),
            channel_type: ChannelType::Standard,
            call_timeout_ms: 1_000,
            channel_map: None,
        }
    }
}
