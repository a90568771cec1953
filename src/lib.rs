//! NBFM demodulation pipeline and MPT-1327 trunking control state core.

pub mod buffer;
pub mod channel_map;
pub mod config;
pub mod dsp;
pub mod error;
pub mod eventbus;
pub mod events;
pub mod mpt1327;
pub mod pipeline;
