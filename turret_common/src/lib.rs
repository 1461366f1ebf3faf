//! Turret Common Library
//!
//! Shared constants, value types, configuration loading and hardware driver
//! traits for all turret workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Actuator limits, timing defaults and default paths
//! - [`types`] - Value types passed between the control modules
//! - [`clock`] - Monotonic time source with a manual clock for tests
//! - [`hal`] - Driver traits for servo, emitter and fault indicator outputs
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use turret_common::prelude::*;
//! use turret_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod clock;
pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod types;
