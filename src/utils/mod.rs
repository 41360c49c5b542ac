//! Shared utilities

pub mod morphology;
pub mod preprocessing;
pub mod providers;

pub use morphology::{binary_erode, post_process_mask};
pub use preprocessing::ImagePreprocessor;
pub use providers::{ExecutionProviderManager, ProviderInfo};
