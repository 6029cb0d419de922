//! Job and news import pipelines.
//!
//! Leaf-first: `fingerprint` and `dedup` decide novelty, `recruiter` drops
//! agency postings, `classifier` and `enricher` wrap the model, `pipeline`
//! drives a run, `store` persists it.

pub mod classifier;
pub mod dedup;
pub mod enricher;
pub mod fetchers;
pub mod fingerprint;
pub mod handlers;
pub mod images;
pub mod pipeline;
pub mod prompts;
pub mod recruiter;
pub mod scraper;
pub mod store;
pub mod text;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
