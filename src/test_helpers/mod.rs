//! Shared fakes, builders and temp-dir fixtures for unit tests.

// Not every helper is used by every test module
#![allow(dead_code)]

mod fakes;
mod fixtures;
mod temp;

pub use fakes::{FakeDiscovery, FakeLink};
pub use fixtures::{DeviceBuilder, DeviceInfoBuilder};
pub use temp::TestContext;
