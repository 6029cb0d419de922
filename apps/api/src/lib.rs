pub mod agent;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod llm_client;
pub mod models;
pub mod normalize;
pub mod routes;
pub mod state;
pub mod tscr;
