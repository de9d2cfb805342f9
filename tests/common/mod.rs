//! Common test infrastructure shared across integration tests.
//!
//! This module provides:
//! - `stubs`: a widget toolkit stand-in (labels, pictures, panels, forms) and
//!   a `UiHost` over it
//! - `test_utils`: session wiring helpers
//!
//! # Usage
//!
//! From any integration test file:
//! ```ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! use common::stubs::{Form, Label, StubHost};
//! use common::{connected_sessions, pump};
//! ```

pub mod stubs;
pub mod test_utils;

// These are public utilities for integration tests - allow unused until tests adopt them.
#[allow(unused_imports)]
pub use test_utils::{connected_sessions, gump, pump, Sessions, GUMP_SERIAL};
