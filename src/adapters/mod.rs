// Adapters layer: concrete implementations for external systems (database, workflow webhook, http).

pub mod http;
pub mod store;
pub mod workflow;
