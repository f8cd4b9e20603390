pub mod ranges;
pub mod stats;
