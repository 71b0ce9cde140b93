pub mod core;
pub mod db;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod server;
pub mod services;
pub mod state;
