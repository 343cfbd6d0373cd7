pub mod convert;
pub mod dynamics;
pub mod frequencies;
pub mod kernel;
pub mod oscillator;
pub mod phasor;
pub mod resonator;
pub mod resonator_bank;
