//! Timeline representations
//!
//! Three alternative timelines drive playback: an on/off trigger grid
//! ([`Pattern`]), pitched note events ([`Notation`]) and raw sample
//! clips ([`Wave`]). Which one a machine uses decides which recall
//! templates get mapped onto its channels.

mod notation;
mod pattern;
mod wave;

pub use notation::{Notation, Note};
pub use pattern::Pattern;
pub use wave::Wave;
