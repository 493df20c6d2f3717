//! `stationd` — the Station Control Plane binary: Request Dispatcher,
//! Station Lifecycle Service, Schema Propagation Service, Dead-Letter
//! Inspector, and DLS bootstrap, wired together over a Metadata Repository
//! and Stream Engine Adapter.
//!
//! Exposed as a library so integration tests can drive the services
//! directly against a [`station_engine::FakeEngine`] without a live NATS
//! server, the same way `sa-gateway`'s handlers are tested against fakes
//! rather than real external services.

pub mod cli;
pub mod dispatcher;
pub mod dls;
pub mod dls_bootstrap;
pub mod lifecycle;
pub mod nuid;
pub mod schema_propagation;
pub mod state;
pub mod validate;

pub use state::AppState;
