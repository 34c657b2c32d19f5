//! # kodegen_bundler_node
//!
//! Packages a Node.js project with an official Node.js runtime release into a
//! self-contained bundle for Linux, macOS or Windows.
//!
//! ## Pipeline
//!
//! 1. Resolve the release archive for the target platform and architecture
//! 2. Download it into a temporary workspace and extract it with 7-Zip
//! 3. Stage the selected project files, the runtime and a launcher script
//! 4. Install production dependencies with the bundled npm
//! 5. Write `<target-name>.zip` (or a directory) to the output directory
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_node ./my-app
//! kodegen_bundler_node ./my-app --target-platform win32 --target-arch x64
//! kodegen_bundler_node ./my-app --target-version 20.11.1 --no-zip --flag=--enable-source-maps
//! ```
//!
//! ## Cross-platform bundles
//!
//! Any host can assemble a bundle for any supported target, but dependency
//! installation runs the target's own npm. A Windows target built on Linux or
//! macOS (or the reverse) skips the install with a warning, and the bundle
//! ships without `node_modules`. Build on a host of the target's family when
//! the project has dependencies.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bundler;
pub mod cli;
pub mod error;

pub use bundler::{BundledArtifact, Bundler, BundlerOptions, PackagingRequest, RequestBuilder};
pub use cli::Args;
pub use error::{PackError, Result};
