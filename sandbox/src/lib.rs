//! Sandboxed JS execution core (spec §4.2, component C2): one QuickJS
//! runtime and context per [`SandboxHost`], resource limits, and the
//! injected globals every evaluation sees.

pub mod buffers;
pub mod error;
pub mod globals;
pub mod host;

pub use error::{SandboxError, SandboxResult};
pub use globals::ProcessShim;
pub use host::{EvalOutcome, SandboxConfig, SandboxHost};
