//! # chwire Configuration Module
//!
//! Two kinds of configuration live here:
//!
//! - [`constants`]: wire-format constants and decoder guard limits, checked
//!   against each other at compile time
//! - [`settings`]: the persisted host address used by transport
//!   collaborators to fetch raw response bodies
//!
//! ## Usage
//!
//! ```ignore
//! use chwire::config::{MAX_NESTING_DEPTH, VARIANT_NULL_DISCRIMINATOR};
//! ```

pub mod constants;
pub mod settings;

pub use constants::*;
pub use settings::{
    request_url, settings_path, HostSettings, DEFAULT_HOST, EXPERIMENTAL_TYPE_SETTINGS,
};
