//! autoactivate — module auto-activation and ordering resolver.
//!
//! Given a catalog of candidate modules guarded by declarative conditions,
//! decides which of them activate in the current environment and in what
//! order. Resolution is deferred across sites so that an exclusion declared
//! anywhere removes the module everywhere.
//!
//! See `DESIGN.md` for the architecture overview.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod environment;
pub mod logging;
pub mod registry;
pub mod resolve;
