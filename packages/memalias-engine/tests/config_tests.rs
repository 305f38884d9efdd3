//! Configuration loading and limit enforcement
//!
//! YAML files go through tempfile so every test gets its own path.

use memalias_engine::config::{ConfigError, EngineConfig, Preset};
use memalias_engine::{Engine, EngineError, TypeKind};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn yaml_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_yaml_file() {
    let file = yaml_file(
        r#"version: 1
preset: permissive
overrides:
  flag_indeterminate_reads: true
  max_heap_objects: 3
"#,
    );

    let config = EngineConfig::from_yaml(file.path()).unwrap();
    assert_eq!(config.preset, Preset::Permissive);
    assert!(config.flag_indeterminate_reads);
    assert_eq!(config.max_heap_objects, 3);
    assert_eq!(config.max_frames, 100_000);
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.yaml");

    let config = EngineConfig::from_preset(Preset::Strict)
        .max_frames(12)
        .record_trace(false);
    config.save_yaml(&path).unwrap();

    let reloaded = EngineConfig::from_yaml(&path).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_yaml(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_invalid_yaml_file_rejected() {
    let file = yaml_file("version: 1\npreset: standard\noverrides:\n  max_frames: 0\n");
    let err = EngineConfig::from_yaml(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_frames"));
}

#[test]
fn test_stack_depth_limit() {
    let config = EngineConfig::default().max_frames(2);
    let mut engine = Engine::new(config).unwrap();
    engine.push_frame("main").unwrap();
    engine.push_frame("f").unwrap();

    let err = engine.push_frame("g").unwrap_err();
    assert!(matches!(err, EngineError::StackDepthExceeded { limit: 2 }));
    assert_eq!(engine.space().depth(), 2);
    assert_eq!(engine.operation_count(), 2);
}

#[test]
fn test_heap_limit_counts_released_objects() {
    let file = yaml_file("version: 1\npreset: custom\noverrides:\n  max_heap_objects: 2\n");
    let mut engine = Engine::new(EngineConfig::from_yaml(file.path()).unwrap()).unwrap();
    engine.push_frame("main").unwrap();

    let h = engine.allocate_scalar(TypeKind::Int, None).unwrap();
    engine
        .release_scalar(memalias_engine::Operand::Literal(
            memalias_engine::Value::Pointer(memalias_engine::Address::Heap(h)),
        ))
        .unwrap();
    engine.allocate_array(TypeKind::Bool, 2).unwrap();

    let err = engine.allocate_scalar(TypeKind::Int, None).unwrap_err();
    assert!(matches!(err, EngineError::HeapLimitExceeded { limit: 2 }));
}

#[test]
fn test_empty_array_is_harness_error() {
    let mut engine = Engine::default();
    engine.push_frame("main").unwrap();
    let err = engine.allocate_array(TypeKind::Int, 0).unwrap_err();
    assert!(matches!(err, EngineError::EmptyArrayAllocation(0)));
    assert!(engine.diagnostics().is_empty());
}
