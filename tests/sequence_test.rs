mod common;

use common::{migrations_dir, numbered_steps, write};
use pretty_assertions::assert_eq;
use stepmigrate::prelude::*;

#[test]
fn test_complete_directory_builds() {
    let dir = numbered_steps(5);
    let seq = Sequence::load(dir.path(), ScanPolicy::Strict).expect("complete set should load");
    assert_eq!(seq.len(), 5);
    let labels: Vec<&str> = seq.iter().map(Step::label).collect();
    assert_eq!(labels, vec!["step1", "step2", "step3", "step4", "step5"]);
}

#[test]
fn test_subdirectories_are_scanned() {
    let dir = migrations_dir(&[
        ("1_init.up.sql", ""),
        ("1_init.down.sql", ""),
        ("v2/2_add_col.up.sql", ""),
        ("v2/nested/2_add_col.down.sql", ""),
    ]);
    let seq = Sequence::load(dir.path(), ScanPolicy::Lenient).unwrap();
    assert_eq!(seq.len(), 2);
    let step = seq.get(2).unwrap();
    assert!(step.reverse.path.ends_with("v2/nested/2_add_col.down.sql"));
}

#[test]
fn test_non_matching_files_are_ignored() {
    let dir = migrations_dir(&[
        ("1_init.up.sql", ""),
        ("1_init.down.sql", ""),
        ("README.md", "docs"),
        ("notes.sql", "select 1"),
    ]);
    let report = scan_dir(dir.path()).unwrap();
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.skipped.len(), 2);

    let seq = Sequence::load(dir.path(), ScanPolicy::Lenient).unwrap();
    assert_eq!(seq.len(), 1);
}

#[test]
fn test_strict_policy_rejects_stray_sql() {
    let dir = migrations_dir(&[
        ("1_init.up.sql", ""),
        ("1_init.down.sql", ""),
        ("2_typo.upp.sql", ""),
        ("README.md", ""),
    ]);
    match Sequence::load(dir.path(), ScanPolicy::Strict) {
        Err(MigrateError::SkippedMigrationFiles(paths)) => {
            assert_eq!(paths.len(), 1);
            assert!(paths[0].ends_with("2_typo.upp.sql"));
        }
        other => panic!("expected skipped files error, got {other:?}"),
    }
}

#[test]
fn test_missing_reverse_names_index() {
    let dir = numbered_steps(3);
    std::fs::remove_file(dir.path().join("2_step2.down.sql")).unwrap();
    assert!(matches!(
        Sequence::load(dir.path(), ScanPolicy::Lenient),
        Err(MigrateError::MissingReverseMigration(2))
    ));
}

#[test]
fn test_gap_names_first_missing_index() {
    let dir = numbered_steps(4);
    std::fs::remove_file(dir.path().join("3_step3.up.sql")).unwrap();
    std::fs::remove_file(dir.path().join("3_step3.down.sql")).unwrap();
    assert!(matches!(
        Sequence::load(dir.path(), ScanPolicy::Lenient),
        Err(MigrateError::NonSequentialMigrations(3))
    ));
}

#[test]
fn test_duplicate_forward_names_index_and_direction() {
    let dir = numbered_steps(2);
    write(dir.path(), "2_other.up.sql", "");
    match Sequence::load(dir.path(), ScanPolicy::Lenient) {
        Err(MigrateError::DuplicateMigration { index, direction }) => {
            assert_eq!(index, 2);
            assert_eq!(direction, Direction::Forward);
        }
        other => panic!("expected duplicate error, got {other:?}"),
    }
}

#[test]
fn test_empty_directory_is_empty_sequence() {
    let dir = migrations_dir(&[]);
    let seq = stepmigrate::load(dir.path()).unwrap();
    assert!(seq.is_empty());
}

#[test]
fn test_missing_directory_is_scan_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(
        scan_dir(&missing),
        Err(MigrateError::Scan { .. })
    ));
}
