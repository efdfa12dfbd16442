//! Ingestion of analysis results for one translation unit.
//!
//! File ids inside [`UnitFacts`] are local to the unit. They are mapped to
//! index file ids through the `files` table of the fact set, so a producer
//! never has to know the ids an index already assigned. Facts pointing at a
//! file the unit does not list are skipped.

use crate::error::Result as IndexResult;
use crate::index::location::{FileId, Location};
use crate::index::set::IndexSet;
use crate::index::store::Store;
use crate::index::types::{FixIt, ReferenceFact, Source, SymbolInfo};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Facts produced by analyzing one translation unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitFacts {
    /// Compile configuration; `file_id` is unit-local
    pub source: Source,
    /// Unit-local file id -> path
    pub files: BTreeMap<FileId, String>,
    /// Includer -> files it includes directly
    #[serde(default)]
    pub includes: BTreeMap<FileId, Vec<FileId>>,
    #[serde(default)]
    pub symbols: Vec<(Location, SymbolInfo)>,
    #[serde(default)]
    pub references: Vec<ReferenceFact>,
    #[serde(default)]
    pub fixits: BTreeMap<FileId, Vec<FixIt>>,
}

/// What a merge wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub files: usize,
    pub symbols: usize,
    pub references: usize,
    pub skipped: usize,
}

struct IdMap(FxHashMap<FileId, FileId>);

impl IdMap {
    fn file(&self, local: FileId) -> Option<FileId> {
        self.0.get(&local).copied()
    }

    fn location(&self, loc: &Location) -> Option<Location> {
        let file_id = self.file(loc.file_id)?;
        Some(Location::new(file_id, loc.line, loc.column))
    }
}

fn add_location<K, S>(store: &mut S, key: K, loc: Location) -> IndexResult<()>
where
    K: Ord + Clone,
    S: Store<K, BTreeSet<Location>>,
{
    let mut set = store.get(&key)?.unwrap_or_default();
    if set.insert(loc) {
        store.put(key, set);
    }
    Ok(())
}

fn drop_location<K, S>(store: &mut S, key: K, loc: &Location) -> IndexResult<()>
where
    K: Ord + Clone,
    S: Store<K, BTreeSet<Location>>,
{
    let Some(mut set) = store.get(&key)? else {
        return Ok(());
    };
    if set.remove(loc) {
        if set.is_empty() {
            store.remove(&key);
        } else {
            store.put(key, set);
        }
    }
    Ok(())
}

impl IndexSet {
    /// Merge the facts of one analyzed unit.
    ///
    /// Run [`IndexSet::dirty`] for the unit's files first; facts at an
    /// existing location replace the old ones key by key.
    pub fn merge(&mut self, facts: &UnitFacts) -> IndexResult<MergeReport> {
        let mut report = MergeReport::default();

        let ids = IdMap(
            facts
                .files
                .iter()
                .map(|(&local, path)| Ok((local, self.files.get_or_insert(path)?)))
                .collect::<IndexResult<_>>()?,
        );
        report.files = facts.files.len();

        match ids.file(facts.source.file_id) {
            Some(file_id) => {
                let source = Source {
                    file_id,
                    ..facts.source.clone()
                };
                self.sources.put(source.key(), source);
            }
            None => warn!(file_id = facts.source.file_id, "unit source file not listed"),
        }

        self.merge_dependencies(facts, &ids, &mut report)?;

        for (loc, info) in &facts.symbols {
            let Some(loc) = ids.location(loc) else {
                report.skipped += 1;
                continue;
            };
            if let Some(old) = self.symbols.get(&loc)? {
                for name in old.lookup_names() {
                    drop_location(&mut self.symbol_names, name.to_string(), &loc)?;
                }
                if !old.usr.is_empty() {
                    drop_location(&mut self.usrs, old.usr.clone(), &loc)?;
                }
            }
            for name in info.lookup_names() {
                add_location(&mut self.symbol_names, name.to_string(), loc)?;
            }
            if !info.usr.is_empty() {
                add_location(&mut self.usrs, info.usr.clone(), loc)?;
            }
            self.symbols.put(loc, info.clone());
            report.symbols += 1;
        }

        for fact in &facts.references {
            let (Some(from), Some(to)) = (ids.location(&fact.from), ids.location(&fact.to)) else {
                report.skipped += 1;
                continue;
            };
            add_location(&mut self.references, to, from)?;
            let mut edges = self.targets.get(&from)?.unwrap_or_default();
            edges.insert(to, fact.kind);
            self.targets.put(from, edges);
            report.references += 1;
        }

        for (local, fixits) in &facts.fixits {
            let Some(file_id) = ids.file(*local) else {
                report.skipped += 1;
                continue;
            };
            if fixits.is_empty() {
                self.fixits.remove(&file_id);
            } else {
                self.fixits.put(file_id, fixits.iter().cloned().collect());
            }
        }

        debug!(
            files = report.files,
            symbols = report.symbols,
            references = report.references,
            skipped = report.skipped,
            "merged unit"
        );
        Ok(report)
    }

    /// Replace the include edges of every file in the unit.
    ///
    /// `includes[f] ∋ h` becomes `dependencies[h] ∋ f`; every listed file
    /// also depends on itself.
    fn merge_dependencies(
        &mut self,
        facts: &UnitFacts,
        ids: &IdMap,
        report: &mut MergeReport,
    ) -> IndexResult<()> {
        // Every listed file was analyzed, so its include list is complete
        let mut edges: BTreeMap<FileId, BTreeSet<FileId>> = facts
            .files
            .keys()
            .filter_map(|&local| ids.file(local))
            .map(|file| (file, BTreeSet::new()))
            .collect();
        for (includer, included) in &facts.includes {
            let Some(includer) = ids.file(*includer) else {
                report.skipped += 1;
                continue;
            };
            let headers = edges.entry(includer).or_default();
            for header in included {
                match ids.file(*header) {
                    Some(header) => {
                        headers.insert(header);
                    }
                    None => report.skipped += 1,
                }
            }
        }

        // Stale edges from a previous analysis of the same includers
        for (file, mut dependents) in self.dependencies.entries()? {
            let before = dependents.len();
            dependents.retain(|dependent| {
                *dependent == file
                    || edges
                        .get(dependent)
                        .is_none_or(|headers| headers.contains(&file))
            });
            if dependents.len() != before {
                self.dependencies.put(file, dependents);
            }
        }

        for &file in facts.files.keys() {
            if let Some(file) = ids.file(file) {
                add_dependency(&mut self.dependencies, file, file)?;
            }
        }
        for (includer, headers) in edges {
            for header in headers {
                add_dependency(&mut self.dependencies, header, includer)?;
            }
        }
        Ok(())
    }
}

fn add_dependency<S>(deps: &mut S, file: FileId, dependent: FileId) -> IndexResult<()>
where
    S: Store<FileId, BTreeSet<FileId>>,
{
    let mut set = deps.get(&file)?.unwrap_or_default();
    if set.insert(dependent) {
        deps.put(file, set);
    }
    Ok(())
}

/// Read one unit's facts from a JSON file
pub fn load_facts(path: &Path) -> Result<UnitFacts> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse facts in {}", path.display()))
}

/// Summary of [`merge_fact_files`]
#[derive(Debug, Clone, Default)]
pub struct MergeSummary {
    pub units: usize,
    pub dirty: DirtySummary,
    pub merged: MergeReport,
}

#[derive(Debug, Clone, Default)]
pub struct DirtySummary {
    pub files: u64,
    pub changes: usize,
    /// Invalidated files no unit in the batch covers, in id order.
    /// Their facts are gone until their own units are merged again.
    pub stale: Vec<String>,
}

/// Re-ingest a batch of fact files: dirty the files they cover, merge
/// them, and commit once.
///
/// Nothing is committed if any file fails to load or merge.
pub fn merge_fact_files(
    index: &mut IndexSet,
    paths: &[PathBuf],
    parallel_prune: bool,
    silent: bool,
) -> Result<MergeSummary> {
    let units: Vec<UnitFacts> = paths.iter().map(|p| load_facts(p)).collect::<Result<_>>()?;

    let mut summary = MergeSummary {
        units: units.len(),
        ..Default::default()
    };

    let covered: BTreeSet<&str> = units
        .iter()
        .flat_map(|unit| unit.files.values())
        .map(String::as_str)
        .collect();

    // Known files the batch re-analyzes; new files have nothing to prune
    let changed: Vec<FileId> = covered
        .iter()
        .filter_map(|path| index.files().id_for_str(path))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let progress_bar = if !silent {
        let pb = ProgressBar::new(units.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .context("Invalid progress template")?
                .progress_chars("█▓▒░  "),
        );
        pb.set_message("Merging units...");
        Some(pb)
    } else {
        None
    };

    let result = (|| -> Result<()> {
        if !changed.is_empty() {
            let report = index.dirty_with(&changed, parallel_prune)?;
            let mut stale = Vec::new();
            for id in &report.files {
                match index.files().path(id)? {
                    Some(path) if !covered.contains(path.as_str()) => stale.push(path),
                    _ => {}
                }
            }
            if !stale.is_empty() {
                warn!(files = stale.len(), "invalidated files outside the merged units");
            }
            summary.dirty = DirtySummary {
                files: report.files.len(),
                changes: report.total(),
                stale,
            };
        }

        for (unit, path) in units.iter().zip(paths) {
            let report = index
                .merge(unit)
                .with_context(|| format!("Failed to merge {}", path.display()))?;
            summary.merged.files += report.files;
            summary.merged.symbols += report.symbols;
            summary.merged.references += report.references;
            summary.merged.skipped += report.skipped;
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
        }

        index.commit().context("Failed to commit index")?;
        Ok(())
    })();

    if let Err(e) = result {
        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }
        index.rollback().context("Failed to roll back index")?;
        return Err(e);
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message(format!("Merged {} units", summary.units));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::{SymbolKind, TargetKind};
    use tempfile::TempDir;

    fn sym(name: &str, usr: &str) -> SymbolInfo {
        SymbolInfo {
            symbol_name: name.to_string(),
            usr: usr.to_string(),
            kind: SymbolKind::Function,
            symbol_length: name.len() as u32,
            ..Default::default()
        }
    }

    /// main.c (1) includes util.h (2)
    fn main_unit() -> UnitFacts {
        UnitFacts {
            source: Source {
                file_id: 1,
                compiler: "cc".to_string(),
                ..Default::default()
            },
            files: BTreeMap::from([(1, "/p/main.c".to_string()), (2, "/p/util.h".to_string())]),
            includes: BTreeMap::from([(1, vec![2])]),
            symbols: vec![
                (Location::new(2, 1, 5), sym("ns::helper", "c:@N@ns@F@helper")),
                (Location::new(1, 3, 5), sym("main", "c:@F@main")),
            ],
            references: vec![ReferenceFact {
                from: Location::new(1, 4, 3),
                to: Location::new(2, 1, 5),
                kind: TargetKind::Definition,
            }],
            fixits: BTreeMap::from([(
                1,
                vec![FixIt {
                    line: 4,
                    column: 12,
                    length: 0,
                    text: ";".to_string(),
                }],
            )]),
        }
    }

    fn open(dir: &TempDir) -> IndexSet {
        IndexSet::open(dir.path(), Path::new("/p")).unwrap()
    }

    #[test]
    fn test_merge_populates_every_index() {
        let dir = TempDir::new().unwrap();
        let mut index = open(&dir);
        let report = index.merge(&main_unit()).unwrap();
        assert_eq!(report.symbols, 2);
        assert_eq!(report.references, 1);
        assert_eq!(report.skipped, 0);

        let main_c = index.files().id_for_str("/p/main.c").unwrap();
        let util_h = index.files().id_for_str("/p/util.h").unwrap();
        let helper = Location::new(util_h, 1, 5);
        let call = Location::new(main_c, 4, 3);

        assert_eq!(index.symbols_by_name("helper").unwrap().len(), 1);
        assert_eq!(index.symbols_by_name("ns::helper").unwrap()[0].0, helper);
        assert_eq!(
            index.usr_locations("c:@F@main").unwrap(),
            BTreeSet::from([Location::new(main_c, 3, 5)])
        );
        assert_eq!(index.references_to(&helper).unwrap(), BTreeSet::from([call]));
        assert_eq!(index.targets_of(&call).unwrap().get(&helper), Some(&TargetKind::Definition));
        assert_eq!(index.dependents(util_h).unwrap(), BTreeSet::from([main_c, util_h]));
        assert_eq!(index.dependents(main_c).unwrap(), BTreeSet::from([main_c]));
        assert_eq!(index.sources_for_file(main_c).unwrap()[0].compiler, "cc");
        assert_eq!(index.fixits(main_c).unwrap().len(), 1);
    }

    #[test]
    fn test_unit_ids_are_remapped() {
        let dir = TempDir::new().unwrap();
        let mut index = open(&dir);
        index.merge(&main_unit()).unwrap();

        // Same header, different local numbering
        let other = UnitFacts {
            source: Source {
                file_id: 7,
                ..Default::default()
            },
            files: BTreeMap::from([(7, "/p/other.c".to_string()), (1, "/p/util.h".to_string())]),
            includes: BTreeMap::from([(7, vec![1])]),
            ..Default::default()
        };
        index.merge(&other).unwrap();

        let util_h = index.files().id_for_str("/p/util.h").unwrap();
        let other_c = index.files().id_for_str("/p/other.c").unwrap();
        assert_eq!(other_c, 3);
        assert!(index.dependents(util_h).unwrap().contains(&other_c));
        assert!(index.dependents(util_h).unwrap().contains(&1));
    }

    #[test]
    fn test_remerge_replaces_include_edges() {
        let dir = TempDir::new().unwrap();
        let mut index = open(&dir);
        index.merge(&main_unit()).unwrap();

        let mut unit = main_unit();
        unit.includes.clear();
        index.merge(&unit).unwrap();

        assert_eq!(index.dependents(2).unwrap(), BTreeSet::from([2]));
    }

    #[test]
    fn test_unlisted_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let mut index = open(&dir);
        let mut unit = main_unit();
        unit.symbols.push((Location::new(9, 1, 1), sym("ghost", "")));
        unit.references.push(ReferenceFact {
            from: Location::new(1, 1, 1),
            to: Location::new(9, 1, 1),
            kind: TargetKind::Reference,
        });

        let report = index.merge(&unit).unwrap();
        assert_eq!(report.skipped, 2);
        assert!(index.symbols_by_name("ghost").unwrap().is_empty());
    }

    #[test]
    fn test_replacing_symbol_moves_name() {
        let dir = TempDir::new().unwrap();
        let mut index = open(&dir);
        index.merge(&main_unit()).unwrap();

        let mut unit = main_unit();
        unit.symbols[1].1 = sym("start", "c:@F@start");
        index.merge(&unit).unwrap();

        assert!(index.symbols_by_name("main").unwrap().is_empty());
        assert!(index.usr_locations("c:@F@main").unwrap().is_empty());
        assert_eq!(index.symbols_by_name("start").unwrap().len(), 1);
    }

    #[test]
    fn test_facts_json_defaults() {
        let json = r#"{
            "source": {"file_id": 1},
            "files": {"1": "/p/a.c"},
            "symbols": [[{"file_id": 1, "line": 2, "column": 3}, {"symbol_name": "a"}]]
        }"#;
        let facts: UnitFacts = serde_json::from_str(json).unwrap();
        assert_eq!(facts.symbols.len(), 1);
        assert!(facts.references.is_empty());
        assert!(facts.includes.is_empty());
    }

    #[test]
    fn test_merge_fact_files_commits() {
        let dir = TempDir::new().unwrap();
        let facts = dir.path().join("main.json");
        std::fs::write(&facts, serde_json::to_string(&main_unit()).unwrap()).unwrap();

        let index_dir = dir.path().join("index");
        let mut index = IndexSet::open(&index_dir, Path::new("/p")).unwrap();
        let summary = merge_fact_files(&mut index, &[facts.clone()], true, true).unwrap();
        assert_eq!(summary.units, 1);
        assert_eq!(summary.merged.symbols, 2);
        assert_eq!(summary.dirty.changes, 0);
        assert!(!index.has_pending());

        // Second run re-analyzes known files and replaces their facts
        let summary = merge_fact_files(&mut index, &[facts], false, true).unwrap();
        assert_eq!(summary.dirty.files, 2);
        assert!(summary.dirty.changes > 0);

        let reopened = IndexSet::open(&index_dir, Path::new("/p")).unwrap();
        assert_eq!(reopened.counts().unwrap().symbols, 2);
        assert_eq!(reopened.symbols_by_name("main").unwrap().len(), 1);
    }

    /// b.c includes util.h too, but only main.c's unit is re-merged
    fn other_unit() -> UnitFacts {
        UnitFacts {
            source: Source {
                file_id: 1,
                ..Default::default()
            },
            files: BTreeMap::from([(1, "/p/b.c".to_string()), (2, "/p/util.h".to_string())]),
            includes: BTreeMap::from([(1, vec![2])]),
            symbols: vec![(Location::new(1, 2, 5), sym("bee", "c:@F@bee"))],
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_fact_files_reports_stale_includers() {
        let dir = TempDir::new().unwrap();
        let main_json = dir.path().join("main.json");
        let b_json = dir.path().join("b.json");
        std::fs::write(&main_json, serde_json::to_string(&main_unit()).unwrap()).unwrap();
        std::fs::write(&b_json, serde_json::to_string(&other_unit()).unwrap()).unwrap();

        let mut index = IndexSet::open(&dir.path().join("index"), Path::new("/p")).unwrap();
        let summary =
            merge_fact_files(&mut index, &[main_json.clone(), b_json.clone()], true, true).unwrap();
        assert!(summary.dirty.stale.is_empty());

        let summary = merge_fact_files(&mut index, &[main_json], true, true).unwrap();
        assert_eq!(summary.dirty.files, 3);
        assert_eq!(summary.dirty.stale, vec!["/p/b.c".to_string()]);
        assert!(index.symbols_by_name("bee").unwrap().is_empty());

        // Re-merging the stale unit clears it
        let summary = merge_fact_files(&mut index, &[b_json], true, true).unwrap();
        assert_eq!(summary.dirty.stale, vec!["/p/main.c".to_string()]);
        assert_eq!(index.symbols_by_name("bee").unwrap().len(), 1);
    }

    #[test]
    fn test_merge_fact_files_bad_json_rolls_back() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        std::fs::write(&good, serde_json::to_string(&main_unit()).unwrap()).unwrap();
        std::fs::write(&bad, "{").unwrap();

        let mut index = IndexSet::open(&dir.path().join("index"), Path::new("/p")).unwrap();
        assert!(merge_fact_files(&mut index, &[good, bad], true, true).is_err());
        assert!(!index.has_pending());
        assert!(index.files().is_empty());
    }
}
