// Application layer - Data view contract, notifications and refresh use cases
pub mod binding;
pub mod consistency;
pub mod data_view;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod memory_view;
pub mod refresh_service;
pub mod sensor_repository;

pub use binding::DataViewBinding;
pub use consistency::{DataViewSnapshot, Violation, check_consistency};
pub use data_view::DataView;
pub use error::DataViewError;
pub use event_bus::{Dispatch, EventBus, Listener, ListenerFailure};
pub use events::{DataViewEvent, EventKind, FetchFailure};
pub use memory_view::MemoryDataView;
pub use refresh_service::{RefreshReport, RefreshService};
pub use sensor_repository::SensorRepository;
