// Presentation layer - HTTP surface over the data view
pub mod app_state;
pub mod error;
pub mod handlers;
pub mod notices;
pub mod router;
