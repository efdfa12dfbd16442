//! Utility functions shared by the index and the CLI.
//!
//! ## Modules
//!
//! - [`app_data`] - Application data directory and configuration
//! - [`encoding`] - Varint based binary encoding for table files
//! - [`host`] - `host[:port]` parsing for the daemon address
//! - [`path_codec`] - Reversible path to directory-name encoding
//! - [`project`] - Project root and ancestor discovery
//! - [`text`] - Identifier helpers for source text
//!
//! ```no_run
//! use symdex::utils::{encode_path, find_project_root, RootMode};
//! use std::path::Path;
//!
//! let root = find_project_root(Path::new("src/main.c"), RootMode::SourceRoot);
//! let dir_name = encode_path(&root).unwrap();
//! ```

pub mod app_data;
pub mod encoding;
pub mod host;
pub mod path_codec;
pub mod project;
pub mod text;

pub use app_data::*;
pub use host::*;
pub use path_codec::*;
pub use project::*;
pub use text::*;
