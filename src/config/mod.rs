//! # Configuration Management
//!
//! Boundary between the host's loosely-typed property bag and the strongly
//! typed [`Settings`] consumed by every other component.

pub mod settings;

pub use settings::{Settings, TlsSettings};
