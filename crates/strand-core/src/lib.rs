//! Strand Core - real-time pattern/notation sequencer engine

pub mod buffer;
pub mod config;
pub mod engine;
pub mod export;
pub mod graph;
pub mod plugin;
pub mod recall;
pub mod soundcard;
pub mod task;
pub mod thread;
pub mod timeline;
pub mod types;
pub mod voice;

pub use types::*;
