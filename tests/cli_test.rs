//! CLI integration tests for the schema-norm binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("schema-norm"))
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

mod normalize_command {
    use super::*;

    #[test]
    fn normalizes_a_directory() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp, "schemas/plain.json", r#"{"type": "object"}"#);
        write_file(
            &tmp,
            "schemas/list.json",
            r##"{"properties": {"next": {"$ref": "#"}}}"##,
        );

        // A recursive schema was found, so the run reports findings.
        cmd()
            .current_dir(tmp.path())
            .args(["normalize", "schemas"])
            .assert()
            .code(1);

        assert!(tmp.path().join("Normalized_schemas/plain_Normalized.json").exists());
        assert!(tmp.path().join("Normalized_schemas/list_Normalized.json").exists());

        let report = fs::read_to_string(tmp.path().join("analysis_schemas.csv")).unwrap();
        let mut lines = report.lines();
        assert_eq!(
            lines.next(),
            Some("name,recursiv,unguarded_recursiv,invalid_reference,illegal_draft")
        );
        assert!(report.contains("list.json,TRUE,,,"));
        assert!(report.contains("plain.json,,,,"));
    }

    #[test]
    fn unguarded_recursion_sets_both_flags() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp, "schemas/loop.json", r##"{"$ref": "#"}"##);

        cmd()
            .current_dir(tmp.path())
            .args(["normalize", "schemas"])
            .assert()
            .code(1);

        let report = fs::read_to_string(tmp.path().join("analysis_schemas.csv")).unwrap();
        assert!(report.contains("loop.json,TRUE,TRUE,,"));
    }

    #[test]
    fn illegal_draft_is_recorded_and_batch_continues() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp, "schemas/bad.json", r#"{"type": 12}"#);
        write_file(&tmp, "schemas/good.json", r#"{"type": "string"}"#);

        cmd()
            .current_dir(tmp.path())
            .args(["normalize", "schemas"])
            .assert()
            .code(1);

        let report = fs::read_to_string(tmp.path().join("analysis_schemas.csv")).unwrap();
        assert!(report.contains("bad.json,,,,TRUE"));
        assert!(report.contains("good.json,,,,"));
        assert!(!tmp.path().join("Normalized_schemas/bad_Normalized.json").exists());
    }

    #[test]
    fn distributed_schema_is_skipped_without_allow_remote() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp, "schemas/item.json", r#"{"type": "integer"}"#);
        write_file(&tmp, "schemas/dist.json", r#"{"$ref": "item.json"}"#);

        cmd()
            .current_dir(tmp.path())
            .args(["normalize", "schemas"])
            .assert()
            .success();

        assert!(!tmp.path().join("Normalized_schemas/dist_Normalized.json").exists());

        cmd()
            .current_dir(tmp.path())
            .args(["normalize", "schemas", "--allow-remote"])
            .assert()
            .success();

        assert!(tmp.path().join("Normalized_schemas/dist_Normalized.json").exists());
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        cmd()
            .current_dir(tmp.path())
            .args(["normalize", "nonexistent"])
            .assert()
            .failure()
            .code(3);
    }

    #[test]
    fn corpus_mode_requires_fullpath() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("corpus")).unwrap();
        cmd()
            .current_dir(tmp.path())
            .args(["normalize", "corpus", "--kind", "corpus"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--fullpath"));
    }

    #[test]
    fn corpus_mode_skips_deleted_rows() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp, "corpus/pp_1.json", r#"{"type": "object"}"#);
        write_file(
            &tmp,
            "repos_fullpath",
            "pp_1.json http://example.com/a.json\npp_2.json deleted\n",
        );

        cmd()
            .current_dir(tmp.path())
            .args([
                "normalize",
                "corpus",
                "--kind",
                "corpus",
                "--fullpath",
                "repos_fullpath",
            ])
            .assert()
            .success();

        let report = fs::read_to_string(tmp.path().join("analysis_corpus.csv")).unwrap();
        assert!(report.contains("pp_1.json,,,,"));
        assert!(!report.contains("pp_2.json"));
    }
}

mod recursion_command {
    use super::*;

    #[test]
    fn classifies_normalized_schemas() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp, "normalized/plain.json", r#"{"type": "object"}"#);
        write_file(&tmp, "normalized/loop.json", r##"{"$ref": "#"}"##);
        write_file(
            &tmp,
            "normalized/guarded.json",
            r##"{"oneOf": [{"type": "null"}, {"$ref": "#"}]}"##,
        );

        cmd()
            .current_dir(tmp.path())
            .args(["recursion", "normalized"])
            .assert()
            .code(1);

        let report = fs::read_to_string(tmp.path().join("recursion_normalized.csv")).unwrap();
        assert!(report.contains("plain.json,,,,"));
        assert!(report.contains("loop.json,TRUE,TRUE,,"));
        assert!(report.contains("guarded.json,TRUE,,,"));
    }
}

mod stats_command {
    use super::*;

    #[test]
    fn reports_schema_types() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp, "schemas/single.json", r#"{"type": "object"}"#);
        write_file(&tmp, "schemas/item.json", r#"{"type": "integer"}"#);
        write_file(&tmp, "schemas/dist.json", r#"{"$ref": "item.json"}"#);

        cmd()
            .current_dir(tmp.path())
            .args(["normalize", "schemas", "--allow-remote"])
            .assert()
            .success();

        cmd()
            .current_dir(tmp.path())
            .args(["stats", "schemas", "Normalized_schemas"])
            .assert()
            .success();

        let types = fs::read_to_string(tmp.path().join("schemaTypes.csv")).unwrap();
        assert!(types.starts_with("name,distributed\n"));
        assert!(types.contains("dist.json,TRUE"));
        assert!(types.contains("single.json,\n"));
    }
}
