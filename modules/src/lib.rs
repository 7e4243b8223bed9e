//! Built-in Module Table (spec §4.3, C3): the registry of trusted modules
//! (`path`, `events`, `buffer`, `fs`-over-VFS, `crypto`, `stream`, `util`,
//! `process`, `timers`, `url`, `os`) exposed to sandboxed code, matching the
//! fixed name set `xmas_resolver::builtins::BUILTIN_MODULES` recognizes.
//!
//! Each submodule exposes a plain `install(ctx, ...) -> Result<Object>`
//! building the namespace object Node's own `require("<name>")` would
//! return; [`BuiltinTable`] is the single dispatch point `xmas-loader` calls
//! when a resolved specifier is a built-in rather than a VFS path.

pub mod buffer;
pub mod crypto;
pub mod error;
pub mod events;
pub mod fs;
pub mod os;
pub mod path;
pub mod process;
pub mod registry;
pub mod stream;
pub mod timers;
pub mod url;
pub mod util;

pub use error::{BuiltinError, BuiltinResult};
pub use fs::SharedVfs;
pub use registry::BuiltinTable;
