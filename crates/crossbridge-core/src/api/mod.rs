//! API implementation submodules.
//!
//! Each submodule contains `impl ProcessBridge` blocks that extend the public
//! API with one namespace's operations. The struct definition remains in
//! `lib.rs`.

mod builder;
mod codecs;
mod interfaces;
mod invokers;
mod quiet;
mod services;

pub use builder::ProcessBridgeBuilder;
pub use quiet::QuietBridge;
