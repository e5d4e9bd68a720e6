//! Workspace facade crate.
//!
//! Host applications can depend on `r2box-workspace` and enable the
//! `desktop-shims` feature instead of wiring each workspace crate
//! (`core-service`, `bridge-desktop`, ...) individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
