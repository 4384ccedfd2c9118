//! Config files on disk are merged in the order given.

use std::io::Write;

use esx_config::load_layered_yaml;

fn write_yaml(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn later_file_overrides_earlier_file() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_yaml(
        &dir,
        "base.yaml",
        "elasticsearch:\n  repository: backups\nexporter:\n  threads: 4\n",
    );
    let local = write_yaml(&dir, "local.yaml", "exporter:\n  threads: 1\n");

    let cfg = load_layered_yaml(&[&base, &local]).unwrap().exporter().unwrap();

    assert_eq!(cfg.elasticsearch.repository, "backups");
    assert_eq!(cfg.exporter.threads, 1);
    cfg.validate().unwrap();
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");
    let err = load_layered_yaml(&[&missing]).unwrap_err();
    assert!(format!("{err:#}").contains("nope.yaml"));
}

#[test]
fn no_files_yields_defaults() {
    let none: [&str; 0] = [];
    let loaded = load_layered_yaml(&none).unwrap();
    let cfg = loaded.exporter().unwrap();
    assert_eq!(cfg.exporter.threads, 4);
    assert!(cfg.validate().is_err(), "repository has no default");
}
