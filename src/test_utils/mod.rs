//! Helpers shared by unit tests and, behind the `test-util` feature, by the
//! integration tests.

mod memory_broker;

pub use memory_broker::MemoryBroker;
