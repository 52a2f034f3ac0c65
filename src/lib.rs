// Event-driven data view over IoT sensor data
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
