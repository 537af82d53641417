//! bazel-mcp core - target resolution and query planning
//!
//! Turns a user-supplied identifier (a Bazel label or a file path) into a
//! canonical label, and turns a label plus a mode into the exact argument list
//! handed to `bazel`. Everything here except [`process`] is pure.

pub mod depth;
pub mod error;
pub mod paths;
pub mod process;
pub mod query;
pub mod target;

pub use depth::DepthArg;
pub use error::{Error, Result};
pub use process::BazelRunner;
pub use query::{plan, OutputFormat, QueryMode, QueryPlan};
pub use target::{resolve, Label};
