//! On-disk layout, reopen and version checks.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use symdex::IndexError;
use symdex::index::{FixIt, IndexSet, Location, ProjectRegistry, Source, SymbolInfo, UnitFacts};
use symdex::utils::{AppConfig, decode_path, index_dir_in, list_indexed_in};
use tempfile::TempDir;

fn facts() -> UnitFacts {
    UnitFacts {
        source: Source {
            file_id: 1,
            compiler: "clang".to_string(),
            arguments: vec!["-O2".to_string(), "-DNDEBUG".to_string()],
            ..Default::default()
        },
        files: BTreeMap::from([(1, "/srv/app/main.c".to_string())]),
        symbols: vec![(
            Location::new(1, 7, 5),
            SymbolInfo {
                symbol_name: "app::main".to_string(),
                usr: "c:@F@main".to_string(),
                symbol_length: 4,
                type_name: Some("int (void)".to_string()),
                is_definition: true,
                ..Default::default()
            },
        )],
        fixits: BTreeMap::from([(
            1,
            vec![FixIt {
                line: 9,
                column: 2,
                length: 1,
                text: "}".to_string(),
            }],
        )]),
        ..Default::default()
    }
}

/// A project directory with a source root marker, plus an app data dir
fn workspace() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().canonicalize().unwrap();
    let project = base.join("my_project");
    fs::create_dir_all(project.join(".git")).unwrap();
    fs::create_dir_all(project.join("src")).unwrap();
    let app = base.join("data");
    fs::create_dir_all(&app).unwrap();
    (tmp, project, app)
}

#[test]
fn test_index_lives_in_encoded_directory() {
    let (_tmp, project, app) = workspace();
    let registry = ProjectRegistry::new(&app, &AppConfig::default());

    let handle = registry.project_for_path(&project.join("src")).unwrap();
    {
        let mut index = handle.write().unwrap();
        index.merge(&facts()).unwrap();
        index.commit().unwrap();
    }

    let dir = index_dir_in(&app, &project).unwrap();
    let name = dir.file_name().unwrap().to_str().unwrap();
    assert!(name.contains("my<underscore>project"));
    assert_eq!(decode_path(name), project);
    for table in ["meta.json", "symbols.db", "symnames.db", "usrs.db", "sources.db", "fixits.db", "files.db"] {
        assert!(dir.join(table).is_file(), "{} missing", table);
    }

    let listed = list_indexed_in(&app).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].root_path, project);
}

#[test]
fn test_everything_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    {
        let mut index = IndexSet::open(tmp.path(), Path::new("/srv/app")).unwrap();
        index.merge(&facts()).unwrap();
        index.commit().unwrap();
    }

    let index = IndexSet::open(tmp.path(), Path::new("/srv/app")).unwrap();
    let main = Location::new(1, 7, 5);
    let info = index.symbol(&main).unwrap().unwrap();
    assert_eq!(info.type_name.as_deref(), Some("int (void)"));
    assert!(info.is_definition);

    assert_eq!(index.symbols_by_name("main").unwrap().len(), 1);
    assert_eq!(index.usr_locations("c:@F@main").unwrap().len(), 1);
    let sources = index.sources_for_file(1).unwrap();
    assert_eq!(sources[0].arguments, vec!["-O2", "-DNDEBUG"]);
    assert_eq!(index.fixits(1).unwrap().iter().next().unwrap().text, "}");
    assert_eq!(index.meta().symbol_count, 1);
    assert_eq!(index.meta().file_count, 1);
}

#[test]
fn test_uncommitted_changes_are_lost() {
    let tmp = TempDir::new().unwrap();
    {
        let mut index = IndexSet::open(tmp.path(), Path::new("/srv/app")).unwrap();
        index.commit().unwrap();
        index.merge(&facts()).unwrap();
    }

    let index = IndexSet::open(tmp.path(), Path::new("/srv/app")).unwrap();
    assert!(index.files().is_empty());
    assert!(index.symbols_by_name("main").unwrap().is_empty());
}

#[test]
fn test_other_version_refuses_to_open() {
    let (_tmp, project, app) = workspace();
    let dir = index_dir_in(&app, &project).unwrap();
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("meta.json"),
        r#"{"version": 1024, "root_path": "/x", "created_at": 0, "updated_at": 0}"#,
    )
    .unwrap();
    fs::write(dir.join("symbols.db"), b"garbage").unwrap();

    match IndexSet::open(&dir, &project) {
        Err(IndexError::VersionMismatch { found, .. }) => assert_eq!(found, 1024),
        other => panic!("expected version mismatch, got {:?}", other),
    }

    let registry = ProjectRegistry::new(&app, &AppConfig::default());
    assert!(registry.open(&project).is_err());
}

#[test]
fn test_abandoned_temp_files_do_not_leak() {
    let tmp = TempDir::new().unwrap();
    let mut index = IndexSet::open(tmp.path(), Path::new("/srv/app")).unwrap();
    index.merge(&facts()).unwrap();
    index.commit().unwrap();

    let leftovers: Vec<_> = fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
