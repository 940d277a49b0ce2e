//! Terminal user interface

pub mod progress;

pub use progress::RunProgress;
