//! Value nodes
//!
//! Nodes that compute a value and publish it into the walk's variables.

mod math_random;

pub use math_random::MathRandomNode;
