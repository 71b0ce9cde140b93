pub mod auth;
pub mod chat;
pub mod datastore;
pub mod feedback;
pub mod messages;
