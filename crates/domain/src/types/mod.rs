//! Controller payload types

pub mod controller;
pub mod envelope;

pub use controller::{Client, Device, Event};
pub use envelope::{ApiEnvelope, ApiMeta};
