//! `BuiltinTable`: dispatches a built-in module name (matching
//! `xmas_resolver::builtins::BUILTIN_MODULES`) to the namespace object the
//! corresponding `install` function builds. `xmas-loader` calls this when a
//! resolved specifier turns out to be a built-in rather than a VFS path.

use rsquickjs::{Ctx, Object, Result};

use crate::error::BuiltinError;
use crate::fs::SharedVfs;

/// Owns the one piece of external state a built-in module needs: the VFS
/// backing `fs`/`fs/promises`. Everything else is stateless per install.
#[derive(Clone, Default)]
pub struct BuiltinTable {
    vfs: Option<SharedVfs>,
}

impl BuiltinTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vfs(vfs: SharedVfs) -> Self {
        Self { vfs: Some(vfs) }
    }

    pub fn attach_vfs(&mut self, vfs: SharedVfs) {
        self.vfs = Some(vfs);
    }

    /// Build the namespace object for `name` (already stripped of any
    /// `node:` prefix by the resolver). Returns `UnknownModule` for anything
    /// not in `xmas_resolver::builtins::BUILTIN_MODULES`.
    pub fn install<'js>(&self, ctx: &Ctx<'js>, name: &str) -> Result<Object<'js>> {
        match name {
            "path" => crate::path::install(ctx),
            "events" => crate::events::install(ctx),
            "buffer" => crate::buffer::install(ctx),
            "fs" => crate::fs::install(ctx, self.vfs.clone(), false),
            "fs/promises" => crate::fs::install(ctx, self.vfs.clone(), true),
            "crypto" => crate::crypto::install(ctx),
            "stream" => crate::stream::install(ctx, false),
            "stream/promises" => crate::stream::install(ctx, true),
            "util" => crate::util::install(ctx),
            "process" => crate::process::install(ctx),
            "timers" => crate::timers::install(ctx),
            "timers/promises" => crate::timers::install_promises(ctx),
            "url" => crate::url::install(ctx),
            "os" => crate::os::install(ctx),
            other => Err(rsquickjs::Exception::throw_reference(
                ctx,
                &BuiltinError::UnknownModule(other.to_string()).to_string(),
            )),
        }
    }

    /// Whether `name` is one this table can install (mirrors
    /// `xmas_resolver::builtins::BUILTIN_MODULES` so the two stay aligned).
    pub fn recognizes(name: &str) -> bool {
        matches!(
            name,
            "path"
                | "events"
                | "buffer"
                | "fs"
                | "fs/promises"
                | "crypto"
                | "stream"
                | "stream/promises"
                | "util"
                | "process"
                | "timers"
                | "timers/promises"
                | "url"
                | "os"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_matches_resolver_builtin_list() {
        for name in xmas_resolver::builtins::BUILTIN_MODULES {
            assert!(BuiltinTable::recognizes(name), "missing dispatch for {name}");
        }
    }
}
