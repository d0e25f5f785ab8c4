//! Runtime traits for communication backend abstraction

mod communicator;

pub use communicator::{CommStats, Communicator, ReduceBuffer};
