pub mod chat;
pub mod datastore;
pub mod embeddings;
pub mod feedback;
pub mod health;
pub mod login;
pub mod messages;
pub mod query;
