//! Audio input.

pub mod wav;

pub use wav::{AudioBuffer, load_wav, read_wav};
