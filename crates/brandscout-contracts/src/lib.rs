//! Provider-agnostic contracts shared by the BrandScout engine and CLI.
//!
//! Nothing in here talks to the network or decodes images: it is the vocabulary
//! (run states, events, summaries, model catalogue) the other crates agree on.

pub mod events;
pub mod models;
pub mod runs;
