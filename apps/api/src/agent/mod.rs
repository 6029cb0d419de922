//! Tool layer for the conversational agent.

pub mod handlers;
pub mod market;
pub mod tools;
