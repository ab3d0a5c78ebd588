//! # Pulsecard Core
//!
//! Shared foundation for the push pipeline: the task/series data model,
//! service configuration, the error type, and the narrow traits behind
//! which the external collaborators (configuration store, send history)
//! live.
//!
//! ## Architecture
//! ```text
//! Scheduler (tick + scan)
//!   └── TaskRunner
//!         ├── SeriesSampler / LatestFetcher  → metrics backend (HTTP)
//!         ├── Composer                       → CardDocument
//!         └── DeliveryClient                 → chat webhooks (HTTP)
//!               └── SendHistory              → bounded record sink
//! ```
//! Everything above speaks the types defined here.

pub mod config;
pub mod error;
pub mod model;
pub mod retry;
pub mod traits;

pub use config::PulsecardConfig;
pub use error::{PulsecardError, Result};
pub use retry::RetryPolicy;
pub use model::{
    CardStyle, Destination, DisplayMode, LabelSelector, PushMode, QueryBinding, RunState, Sample,
    ScheduleEntry, SendRecord, Series, Snapshot, TaskDefinition,
};
pub use traits::{SendHistory, TaskConfigStore};
