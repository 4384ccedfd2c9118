//! Keys the exporter never reads are reported; `Fail` turns them into an error.

use esx_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const CLEAN_YAML: &str = r#"
elasticsearch:
  endpoints: ["http://es01:9200"]
  repository: "backups"
  auth:
    username_env: "ES_USER"
exporter:
  threads: 2
telemetry:
  path: "/metrics"
"#;

const TYPO_YAML: &str = r#"
elasticsearch:
  repository: "backups"
exporter:
  thread: 2
  schedul: "*/1 * * * *"
"#;

#[test]
fn clean_config_reports_nothing() {
    let loaded = load_layered_yaml_from_strings(&[CLEAN_YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn typos_are_reported_under_warn() {
    let loaded = load_layered_yaml_from_strings(&[TYPO_YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/exporter/schedul", "/exporter/thread"]
    );
}

#[test]
fn typos_fail_under_fail() {
    let loaded = load_layered_yaml_from_strings(&[TYPO_YAML]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("/exporter/thread"), "{msg}");
}
