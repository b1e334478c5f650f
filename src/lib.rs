//! Reconciliation controller mirroring cluster workloads into an external
//! HTTP registry.
//!
//! Pipeline: [`Informer`] → [`EventRouter`] → [`WorkQueue`] → workers →
//! [`SyncEngine`] → [`Annotator`]. [`ControllerBuilder`] wires it together.

mod annotator;
mod cache;
mod cluster;
mod config;
mod controller;
mod errors;
mod informer;
mod queue;
mod registry;
mod resource;
mod router;
mod sync;

pub mod constants;
pub mod metrics;

pub use annotator::*;
pub use cache::*;
pub use cluster::*;
pub use config::*;
pub use controller::*;
pub use errors::*;
pub use informer::*;
pub use queue::*;
pub use registry::*;
pub use resource::*;
pub use router::*;
pub use sync::*;

//-----------------------------------------------------------
// Test utils


//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;
const API_SLO: Objective = Objective::new("api")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms250, ObjectivePercentile::P99);
