//! Repository implementations for file-backed storage

pub mod candles;
pub mod outputs;

pub use candles::*;
pub use outputs::*;
