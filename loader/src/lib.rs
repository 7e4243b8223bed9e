//! Module loading (spec §4.5-§4.6, C5+C6): `CommonJsLoader` implements
//! `require(id)`, `EsmLoader` implements the ESM link/evaluate pipeline.
//! Both share a `Resolver` and `BuiltinTable` so `require("./x")` and
//! `import("./x")` resolve identically, but each keeps its own module
//! cache keyed by resolved absolute path — spec §4.6's duality is modeled
//! as two independent loaders over one resolution layer, not one loader
//! with two front-ends.

pub mod commonjs;
pub mod error;
pub mod esm;

pub use commonjs::{CommonJsLoader, ModuleDescriptor, SharedVfs};
pub use error::{LoaderError, LoaderResult};
pub use esm::{EsmLoader, ModuleState};
