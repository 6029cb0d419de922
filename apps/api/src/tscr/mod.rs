//! Two-stage context retrieval for the voice agent.
//!
//! `keyword_cache` answers simple queries from memory, `fast_path` turns a
//! hit into a spoken teaser and loads full results in the background,
//! `pending` holds those results until the follow-up arrives.

pub mod fast_path;
pub mod handlers;
pub mod keyword_cache;
pub mod pending;
pub mod search;
pub mod session;
pub mod teaser;

#[cfg(test)]
pub(crate) mod testing;
