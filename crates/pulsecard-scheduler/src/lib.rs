//! # Pulsecard Scheduler
//!
//! The time-driven half of the pipeline: a minute-tick scan that matches
//! weekday/time-of-day schedules, a bounded queue with a single spaced
//! worker, per-task admission control, and per-destination delivery
//! locks.
//!
//! ## Architecture
//! ```text
//! Scheduler (60s tick, plus one scan at startup)
//!   └── scan: due? interval ok? → WorkQueue (cap 100, drop on full)
//!         └── worker (serialized, 500ms spacing)
//!               └── TaskRunner
//!                     ├── TaskRegistry.try_acquire   (fail fast)
//!                     ├── QuerySource fetch per binding
//!                     ├── compose → CardDocument
//!                     └── per destination: KeyedLocks → Deliverer
//! ```
//! No ambient globals: the Scheduler owns its queue, the registries are
//! built at startup and injected.

pub mod engine;
pub mod locks;
pub mod queue;
pub mod runner;
pub mod store;

pub use engine::Scheduler;
pub use locks::{KeyedLocks, TaskRegistry};
pub use queue::{WorkQueue, spawn_worker};
pub use runner::{RunnerOptions, TaskRunner};
pub use store::FileTaskStore;
