//! Invalidation of stale facts when source files change.
//!
//! A pass runs in two phases:
//! 1. the transitive dependent set `D*` of the changed files is computed from
//!    the dependency table
//! 2. five prune functions compute a change set for each content store
//!    against that fixed `D*`
//!
//! The prunes only read. Their change sets are applied together once all
//! five have succeeded, so a failing read leaves every store untouched.

use crate::error::Result;
use crate::index::location::{FileId, Location};
use crate::index::set::IndexSet;
use crate::index::store::{Store, WriteBatch};
use crate::index::types::{SymbolInfo, TargetKind};
use roaring::RoaringBitmap;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

/// Change set produced by one prune function
pub type Prune<K, V> = WriteBatch<K, V>;

/// Transitive closure of `changed` over the dependency table.
///
/// Only point lookups are issued: a file is expanded once, when it is
/// first reached.
pub fn dependents_closure<S>(deps: &S, changed: impl IntoIterator<Item = FileId>) -> Result<RoaringBitmap>
where
    S: Store<FileId, BTreeSet<FileId>>,
{
    let mut closure = RoaringBitmap::new();
    let mut frontier = VecDeque::new();

    for file in changed {
        if closure.insert(file) {
            frontier.push_back(file);
        }
    }

    while let Some(file) = frontier.pop_front() {
        let Some(dependents) = deps.get(&file)? else {
            continue;
        };
        for dependent in dependents {
            if closure.insert(dependent) {
                frontier.push_back(dependent);
            }
        }
    }

    Ok(closure)
}

#[inline]
fn is_dirty(dirty: &RoaringBitmap, loc: &Location) -> bool {
    dirty.contains(loc.file_id)
}

/// Remove every symbol declared in a dirty file
pub fn dirty_symbols<S>(symbols: &S, dirty: &RoaringBitmap) -> Result<Prune<Location, SymbolInfo>>
where
    S: Store<Location, SymbolInfo>,
{
    let mut prune = Prune::new();
    for file in dirty {
        for (loc, _) in symbols.range(Location::file_start(file)..=Location::file_end(file))? {
            prune.remove(loc);
        }
    }
    Ok(prune)
}

/// Drop dirty locations from set values; keys matching `drop_key` and keys
/// left with an empty set are removed
fn prune_location_sets<K, S>(
    store: &S,
    dirty: &RoaringBitmap,
    drop_key: impl Fn(&K) -> bool,
) -> Result<Prune<K, BTreeSet<Location>>>
where
    K: Ord + Clone,
    S: Store<K, BTreeSet<Location>>,
{
    let mut prune = Prune::new();
    for (key, mut locations) in store.entries()? {
        if drop_key(&key) {
            prune.remove(key);
            continue;
        }
        let before = locations.len();
        locations.retain(|loc| !is_dirty(dirty, loc));
        if locations.len() == before {
            continue;
        }
        if locations.is_empty() {
            prune.remove(key);
        } else {
            prune.put(key, locations);
        }
    }
    Ok(prune)
}

/// Remove dirty locations from every name entry.
///
/// A name survives as long as one of its locations is clean.
pub fn dirty_symbol_names<S>(names: &S, dirty: &RoaringBitmap) -> Result<Prune<String, BTreeSet<Location>>>
where
    S: Store<String, BTreeSet<Location>>,
{
    prune_location_sets(names, dirty, |_| false)
}

pub fn dirty_usr<S>(usrs: &S, dirty: &RoaringBitmap) -> Result<Prune<String, BTreeSet<Location>>>
where
    S: Store<String, BTreeSet<Location>>,
{
    prune_location_sets(usrs, dirty, |_| false)
}

/// Remove references to dirty locations and dirty referrers
pub fn dirty_references<S>(
    references: &S,
    dirty: &RoaringBitmap,
) -> Result<Prune<Location, BTreeSet<Location>>>
where
    S: Store<Location, BTreeSet<Location>>,
{
    prune_location_sets(references, dirty, |loc| is_dirty(dirty, loc))
}

/// Remove targets of dirty reference sites and edges into dirty files
pub fn dirty_targets<S>(
    targets: &S,
    dirty: &RoaringBitmap,
) -> Result<Prune<Location, BTreeMap<Location, TargetKind>>>
where
    S: Store<Location, BTreeMap<Location, TargetKind>>,
{
    let mut prune = Prune::new();
    for (key, mut edges) in targets.entries()? {
        if is_dirty(dirty, &key) {
            prune.remove(key);
            continue;
        }
        let before = edges.len();
        edges.retain(|loc, _| !is_dirty(dirty, loc));
        if edges.len() == before {
            continue;
        }
        if edges.is_empty() {
            prune.remove(key);
        } else {
            prune.put(key, edges);
        }
    }
    Ok(prune)
}

/// Keys removed and keys rewritten in one store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneCounts {
    pub removed: usize,
    pub updated: usize,
}

impl PruneCounts {
    fn of<K: Ord + Clone, V: Clone>(prune: &Prune<K, V>) -> Self {
        let removed = prune.removals();
        Self {
            removed,
            updated: prune.len() - removed,
        }
    }

    pub fn total(&self) -> usize {
        self.removed + self.updated
    }
}

/// Outcome of a dirty pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirtyReport {
    /// The transitive dirty set
    pub files: RoaringBitmap,
    pub symbols: PruneCounts,
    pub symbol_names: PruneCounts,
    pub references: PruneCounts,
    pub targets: PruneCounts,
    pub usrs: PruneCounts,
}

impl DirtyReport {
    /// True when the pass changed nothing
    pub fn is_noop(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.symbols.total()
            + self.symbol_names.total()
            + self.references.total()
            + self.targets.total()
            + self.usrs.total()
    }
}

type Prunes = (
    Result<Prune<Location, SymbolInfo>>,
    Result<Prune<String, BTreeSet<Location>>>,
    Result<Prune<Location, BTreeSet<Location>>>,
    Result<Prune<Location, BTreeMap<Location, TargetKind>>>,
    Result<Prune<String, BTreeSet<Location>>>,
);

impl IndexSet {
    /// Invalidate every fact derived from `changed` or its dependents.
    ///
    /// The dependency table is only read. On error no store is modified.
    pub fn dirty(&mut self, changed: &[FileId]) -> Result<DirtyReport> {
        self.dirty_with(changed, true)
    }

    /// [`IndexSet::dirty`] with control over running the prunes on the rayon pool
    pub fn dirty_with(&mut self, changed: &[FileId], parallel: bool) -> Result<DirtyReport> {
        let files = dependents_closure(&self.dependencies, changed.iter().copied())?;
        debug!(changed = changed.len(), closure = files.len(), "computed dirty set");

        let (symbols, names, references, targets, usrs) = self.compute_prunes(&files, parallel);
        let symbols = symbols?;
        let names = names?;
        let references = references?;
        let targets = targets?;
        let usrs = usrs?;

        let report = DirtyReport {
            symbols: PruneCounts::of(&symbols),
            symbol_names: PruneCounts::of(&names),
            references: PruneCounts::of(&references),
            targets: PruneCounts::of(&targets),
            usrs: PruneCounts::of(&usrs),
            files,
        };

        symbols.apply(&mut self.symbols);
        names.apply(&mut self.symbol_names);
        references.apply(&mut self.references);
        targets.apply(&mut self.targets);
        usrs.apply(&mut self.usrs);

        info!(
            files = report.files.len(),
            symbols = report.symbols.removed,
            changes = report.total(),
            "dirty pass"
        );
        Ok(report)
    }

    fn compute_prunes(&self, files: &RoaringBitmap, parallel: bool) -> Prunes {
        if !parallel {
            return (
                dirty_symbols(&self.symbols, files),
                dirty_symbol_names(&self.symbol_names, files),
                dirty_references(&self.references, files),
                dirty_targets(&self.targets, files),
                dirty_usr(&self.usrs, files),
            );
        }

        let ((symbols, names), (references, (targets, usrs))) = rayon::join(
            || {
                rayon::join(
                    || dirty_symbols(&self.symbols, files),
                    || dirty_symbol_names(&self.symbol_names, files),
                )
            },
            || {
                rayon::join(
                    || dirty_references(&self.references, files),
                    || {
                        rayon::join(
                            || dirty_targets(&self.targets, files),
                            || dirty_usr(&self.usrs, files),
                        )
                    },
                )
            },
        );
        (symbols, names, references, targets, usrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::MemoryStore;

    fn loc(file: FileId, line: u32, column: u32) -> Location {
        Location::new(file, line, column)
    }

    fn bitmap(files: &[FileId]) -> RoaringBitmap {
        files.iter().copied().collect()
    }

    #[test]
    fn test_closure_follows_chain() {
        // B depends on A, C depends on B
        let (a, b, c) = (1, 2, 3);
        let deps: MemoryStore<FileId, BTreeSet<FileId>> =
            [(a, BTreeSet::from([b])), (b, BTreeSet::from([c]))]
                .into_iter()
                .collect();

        let closure = dependents_closure(&deps, [a]).unwrap();
        assert_eq!(closure.iter().collect::<Vec<_>>(), vec![a, b, c]);

        let from_c = dependents_closure(&deps, [c]).unwrap();
        assert_eq!(from_c.iter().collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn test_closure_handles_cycles_and_reflexive_edges() {
        let deps: MemoryStore<FileId, BTreeSet<FileId>> = [
            (1, BTreeSet::from([1, 2])),
            (2, BTreeSet::from([2, 1, 3])),
            (3, BTreeSet::from([3])),
        ]
        .into_iter()
        .collect();

        let closure = dependents_closure(&deps, [2]).unwrap();
        assert_eq!(closure.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(dependents_closure(&deps, []).unwrap().is_empty());
    }

    #[test]
    fn test_symbol_names_keep_clean_locations() {
        let mut names: MemoryStore<String, BTreeSet<Location>> = MemoryStore::new();
        names.put(
            "foo".to_string(),
            BTreeSet::from([loc(1, 1, 1), loc(2, 1, 1)]),
        );

        let mut partial = names.clone();
        dirty_symbol_names(&partial, &bitmap(&[1]))
            .unwrap()
            .apply(&mut partial);
        assert_eq!(
            partial.get(&"foo".to_string()).unwrap(),
            Some(BTreeSet::from([loc(2, 1, 1)]))
        );

        dirty_symbol_names(&names, &bitmap(&[1, 2]))
            .unwrap()
            .apply(&mut names);
        assert_eq!(names.get(&"foo".to_string()).unwrap(), None);
    }

    #[test]
    fn test_symbols_removed_per_file() {
        let mut symbols: MemoryStore<Location, SymbolInfo> = MemoryStore::new();
        for l in [loc(1, 1, 1), loc(2, 1, 1), loc(2, u32::MAX, 7), loc(3, 0, 0)] {
            symbols.put(l, SymbolInfo::default());
        }

        let prune = dirty_symbols(&symbols, &bitmap(&[2])).unwrap();
        assert_eq!(prune.removals(), 2);
        prune.apply(&mut symbols);

        let left: Vec<Location> = symbols.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(left, vec![loc(1, 1, 1), loc(3, 0, 0)]);
    }

    #[test]
    fn test_references_two_sided() {
        let x = loc(1, 4, 2);
        let y = loc(2, 9, 5);
        let z = loc(3, 1, 1);

        let mut references: MemoryStore<Location, BTreeSet<Location>> = MemoryStore::new();
        references.put(y, BTreeSet::from([x]));
        references.put(z, BTreeSet::from([x, y]));

        let mut targets: MemoryStore<Location, BTreeMap<Location, TargetKind>> = MemoryStore::new();
        targets.put(
            x,
            BTreeMap::from([(y, TargetKind::Definition), (z, TargetKind::Reference)]),
        );
        targets.put(y, BTreeMap::from([(z, TargetKind::Reference)]));

        let dirty = bitmap(&[2]);
        dirty_references(&references, &dirty).unwrap().apply(&mut references);
        dirty_targets(&targets, &dirty).unwrap().apply(&mut targets);

        assert_eq!(references.get(&y).unwrap(), None);
        assert_eq!(references.get(&z).unwrap(), Some(BTreeSet::from([x])));
        assert_eq!(
            targets.get(&x).unwrap(),
            Some(BTreeMap::from([(z, TargetKind::Reference)]))
        );
        assert_eq!(targets.get(&y).unwrap(), None);
    }

    #[test]
    fn test_prunes_are_idempotent() {
        let mut usrs: MemoryStore<String, BTreeSet<Location>> = MemoryStore::new();
        usrs.put("c:@F@foo".to_string(), BTreeSet::from([loc(1, 1, 1), loc(4, 2, 2)]));
        usrs.put("c:@F@bar".to_string(), BTreeSet::from([loc(1, 9, 1)]));

        let dirty = bitmap(&[1]);
        let first = dirty_usr(&usrs, &dirty).unwrap();
        assert_eq!(PruneCounts::of(&first), PruneCounts { removed: 1, updated: 1 });
        first.apply(&mut usrs);

        assert!(dirty_usr(&usrs, &dirty).unwrap().is_empty());
    }

    #[test]
    fn test_clean_entries_untouched() {
        let names: MemoryStore<String, BTreeSet<Location>> =
            [("keep".to_string(), BTreeSet::from([loc(5, 1, 1)]))]
                .into_iter()
                .collect();
        assert!(dirty_symbol_names(&names, &bitmap(&[1, 2, 3])).unwrap().is_empty());
    }

    #[test]
    fn test_report_counts() {
        let report = DirtyReport {
            symbols: PruneCounts { removed: 2, updated: 0 },
            targets: PruneCounts { removed: 0, updated: 1 },
            ..Default::default()
        };
        assert_eq!(report.total(), 3);
        assert!(!report.is_noop());
        assert!(DirtyReport::default().is_noop());
    }
}
