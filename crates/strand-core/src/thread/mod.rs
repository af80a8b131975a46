//! Thread layer
//!
//! The engine's threads form a small fixed tree: the audio loop at the
//! root, an optional team of channel threads for the staged pass, and a
//! bounded worker pool for off-band file work. Staged callbacks block
//! only on their own dispatch channel, never on I/O.

pub mod audio_loop;
mod staging;
mod worker;

pub use audio_loop::{start as start_audio_loop, AudioLoopHandle};
pub use staging::StageDispatcher;
pub use worker::WorkerPool;
