//! Trigger nodes
//!
//! Nodes that start walks: on host events or on a timer.

mod event_listener;
mod interval;

pub use event_listener::EventListenerNode;
pub use interval::IntervalNode;
