pub mod fixtures;

pub use fixtures::{connected, decode, fixed_clock, pending, WAIT};
