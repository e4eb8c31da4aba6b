//! Shared test harness: mock upstream + in-process gateway

#![allow(dead_code)]

pub mod gateway;
pub mod mock_upstream;

pub use gateway::Gateway;
pub use mock_upstream::MockUpstream;
