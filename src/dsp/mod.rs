//! Signal-processing stages of the NBFM pipeline (§4.A-F, §4.J).

pub mod demod;
pub mod fir;
pub mod fir_design;
pub mod resample;
pub mod squelch;
