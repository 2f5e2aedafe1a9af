//! Device kernels
//!
//! - `math`: per-element functions run by the elementwise executor
//! - `cast`: element type conversion
//! - `reverse_packed_segs`: segment reversal over packed sequences
//! - `lrn`: cross-channel local response normalization

pub mod cast;
pub mod lrn;
pub mod math;
pub mod reverse_packed_segs;

pub use cast::launch_cast;
pub use lrn::{lrn_backward, lrn_forward, LrnParams};
pub use reverse_packed_segs::{launch_reverse_packed_segs, PackedSegsShape};
