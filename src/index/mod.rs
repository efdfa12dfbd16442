pub mod codec;
pub mod dirty;
pub mod files;
pub mod location;
pub mod merge;
pub mod registry;
pub mod set;
pub mod stats;
pub mod store;
pub mod table;
pub mod types;

pub use dirty::{DirtyReport, PruneCounts, dependents_closure};
pub use files::FileTable;
pub use location::{FileId, Location};
pub use merge::{MergeReport, UnitFacts, merge_fact_files};
pub use registry::{Project, ProjectRegistry};
pub use set::IndexSet;
pub use store::{MemoryStore, Store, WriteBatch};
pub use table::PersistedStore;
pub use types::*;
