//! # symdex - Incremental Symbol Index
//!
//! symdex keeps a persistent, per-project index of the symbols,
//! cross-references and include dependencies extracted from compiled
//! translation units, and keeps it consistent as individual files are
//! re-analyzed.
//!
//! ## Architecture
//!
//! - [`index`] - Location keys, stores, the index set and the dirty engine
//! - [`changes`] - File change batching and debouncing
//! - [`utils`] - Path encoding, project roots, configuration
//! - [`error`] - Library error type
//!
//! ## Quick Start
//!
//! ```ignore
//! use symdex::index::{IndexSet, UnitFacts};
//! use std::path::Path;
//!
//! let mut index = IndexSet::open(Path::new("/tmp/idx"), Path::new("/src/project"))?;
//!
//! // Facts for a re-analyzed unit replace the stale ones
//! let main_c = index.files().id_for_str("/src/project/main.c");
//! index.dirty(&main_c.into_iter().collect::<Vec<_>>())?;
//! index.merge(&facts)?;
//! index.commit()?;
//!
//! for (loc, symbol) in index.symbols_by_name("main")? {
//!     println!("{} {}", loc, symbol.symbol_name);
//! }
//! ```
//!
//! ## Consistency
//!
//! A dirty pass computes the transitive dependents of the changed files
//! first, then prunes the five content stores against that fixed set. The
//! prunes are computed in parallel and only applied once all of them have
//! succeeded.

pub mod changes;
pub mod error;
pub mod index;
pub mod utils;

pub use error::{IndexError, Result};
