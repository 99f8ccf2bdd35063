//! Control nodes
//!
//! Nodes that shape how a walk proceeds.

mod wait;

pub use wait::WaitNode;
