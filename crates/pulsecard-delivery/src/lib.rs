//! # Pulsecard Delivery
//!
//! Posts composed cards to chat webhooks: bounded retries, backend error
//! classification (including rate limiting), and send-history recording.

pub mod client;
pub mod history;

pub use client::{Deliverer, DeliveryClient, SendMeta};
pub use history::MemoryHistory;
