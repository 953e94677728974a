//! Harness Tools Library
//!
//! Resolves multi-compiler build configuration and runs single-call
//! integration probes against deployed programs.

pub mod config;
pub mod declaration;
pub mod logging;
pub mod probe;
pub mod rpc;

pub use config::{ConfigError, ConfigResolver, Configuration, Overrides};
pub use declaration::HarnessToml;
pub use probe::{probe, ProbeError, ProbeResult, ProgramHandle};
pub use rpc::JsonRpcHandle;
