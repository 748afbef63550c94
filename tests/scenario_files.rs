use deadlock_lab::scenario::{Scenario, System};
use deadlock_lab::error::Matrix;
use deadlock_lab::{
    ConfigurationError, DetectionError, ProcessId, ValidationError, detect_multi_instance_deadlock,
};
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_textbook_scenario_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "textbook.json",
        r#"{
            "kind": "multi",
            "resources": [
                {"name": "A", "total": 10},
                {"name": "B", "total": 5},
                {"name": "C", "total": 7}
            ],
            "processes": [
                {"name": "P0", "allocation": {"A": 0, "B": 1, "C": 0}, "max": {"A": 7, "B": 5, "C": 3}},
                {"name": "P1", "allocation": {"A": 2, "B": 0, "C": 0}, "max": {"A": 3, "B": 2, "C": 2}},
                {"name": "P2", "allocation": {"A": 3, "B": 0, "C": 2}, "max": {"A": 9, "B": 0, "C": 2}},
                {"name": "P3", "allocation": {"A": 2, "B": 1, "C": 1}, "max": {"A": 2, "B": 2, "C": 2}},
                {"name": "P4", "allocation": {"A": 0, "B": 0, "C": 2}, "max": {"A": 4, "B": 3, "C": 3}}
            ]
        }"#,
    );

    let System::Multi(state) = Scenario::from_path(&path).unwrap().into_system().unwrap() else {
        panic!("expected a multi-instance scenario");
    };
    assert_eq!(state.available(), &[3, 3, 2]);

    let verdict = detect_multi_instance_deadlock(&state).unwrap();
    let expected: Vec<ProcessId> = ["P1", "P3", "P0", "P2", "P4"]
        .into_iter()
        .map(ProcessId::from)
        .collect();
    assert_eq!(verdict.safe_sequence(), Some(expected.as_slice()));
}

#[test]
fn test_repeated_max_key_in_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "repeated.json",
        r#"{
            "kind": "multi",
            "resources": [{"name": "R1", "total": 5}],
            "processes": [
                {"name": "P1", "allocation": {"R1": 1}, "max": {"R1": 2, "R1": 4}}
            ]
        }"#,
    );
    let err = Scenario::from_path(&path).unwrap().into_system().unwrap_err();
    assert_eq!(
        err,
        DetectionError::Validation(ValidationError::DuplicateEntry {
            process: ProcessId::nth(1),
            resource: "R1".into(),
            matrix: Matrix::Max,
        })
    );
}

#[test]
fn test_missing_file_names_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.json");
    let err = Scenario::from_path(&path).unwrap_err();
    assert!(format!("{err:#}").contains("missing.json"));
}

#[test]
fn test_zero_resources_is_a_configuration_error() {
    let scenario = Scenario::from_json(r#"{"kind": "single", "resource_count": 0, "processes": []}"#)
        .unwrap();
    assert_eq!(
        scenario.into_system().unwrap_err(),
        DetectionError::Configuration(ConfigurationError::NoResources)
    );
}

#[test]
fn test_scenarios_serialize_back() {
    let json = r#"{"kind":"single","resource_count":1,"processes":[{"name":"P1","held":["R1"],"wanted":[]}]}"#;
    let scenario = Scenario::from_json(json).unwrap();
    assert_eq!(serde_json::to_string(&scenario).unwrap(), json);
}
