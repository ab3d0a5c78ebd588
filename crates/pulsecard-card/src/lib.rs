//! # Pulsecard Card
//!
//! Assembles sampled series and snapshots into a notification card.
//! The document is a typed block tree; the chat backend's JSON shape
//! exists only at the `to_wire` boundary.

pub mod compose;
pub mod document;

pub use compose::{QuerySection, compose};
pub use document::{Block, CardDocument, ChartBlock, ChartKind, ChartPoint, ChartSeries, TextBlock};
