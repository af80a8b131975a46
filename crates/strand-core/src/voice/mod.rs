//! Voice identity and correlation
//!
//! A voice is one note-on instance travelling through the graph. Its
//! [`RecallId`] carries a [`RecyclingContext`] - the per-voice mirror of
//! the recycling topology - so a recall deep in the chain can find its
//! siblings at other levels without any global lookup: identity is
//! pointer identity on the shared context.

mod recall_id;
mod recycling_context;

pub use recall_id::{find_recycling_context, RecallId};
pub use recycling_context::RecyclingContext;
