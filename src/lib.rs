// Library surface for the binary and the integration tests.
// Terminal rendering stays in the binary.
pub mod app_dirs;
pub mod config;
pub mod content;
pub mod fireworks;
pub mod lighting;
pub mod logging;
pub mod practice;
pub mod runtime;
pub mod segmenter;
pub mod session;
pub mod settings;
pub mod stats;
pub mod store;
