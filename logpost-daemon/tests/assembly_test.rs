//! Orchestrator assembly tests against the repository example config.

use logpost_core::config::Pipelines;
use logpost_daemon::Orchestrator;

fn parse(yaml: &str) -> Pipelines {
    serde_yaml::from_str(yaml).expect("config should parse")
}

#[tokio::test]
async fn example_config_assembles() {
    let content = include_str!("../../config.yaml.example");
    let pipelines = parse(content);
    let orchestrator = Orchestrator::build(&pipelines).expect("example config should assemble");
    assert_eq!(orchestrator.pipeline_count(), 2);
}

#[tokio::test]
async fn half_wired_pipeline_is_rejected() {
    let pipelines = parse(
        r#"
broken:
  destinations:
    - plugin: stdout
"#,
    );
    let err = Orchestrator::build(&pipelines).unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[tokio::test]
async fn unknown_plugin_is_rejected() {
    let pipelines = parse(
        r#"
beats:
  sources:
    - plugin: kafka
      brokers: [localhost:9092]
  destinations:
    - plugin: stdout
"#,
    );
    let err = Orchestrator::build(&pipelines).unwrap_err();
    assert!(format!("{err:#}").contains("kafka"));
}

#[tokio::test]
async fn invalid_workflow_is_rejected() {
    let pipelines = parse(
        r#"
beats:
  sources:
    - plugin: file
      path: /var/log/app.log
  destinations:
    - plugin: stdout
  processors:
    - stage: 1
      steps:
        - step: 1
          workflow:
            driver: json
            method: project
"#,
    );
    let err = Orchestrator::build(&pipelines).unwrap_err();
    assert!(format!("{err:#}").contains("invalid method"));
}

#[tokio::test]
async fn duplicate_stage_numbers_are_rejected() {
    let pipelines = parse(
        r#"
beats:
  sources:
    - plugin: file
      path: /var/log/app.log
  destinations:
    - plugin: stdout
  processors:
    - stage: 1
      steps: []
    - stage: 1
      steps: []
"#,
    );
    let err = Orchestrator::build(&pipelines).unwrap_err();
    assert!(format!("{err:#}").contains("duplicate stage"));
}

#[tokio::test]
async fn assembled_pipelines_start_and_stop() {
    // stdout 싱크와 tail 소스로 실제 시작/정지 수명주기를 확인한다
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("app.log");
    std::fs::write(&log_path, "{\"a\":1}\n").unwrap();

    let yaml = format!(
        r#"
smoke:
  sources:
    - plugin: file
      path: {}
  destinations:
    - plugin: stdout
  processors:
    - stage: 1
      steps:
        - step: 1
          workflow:
            driver: json
            method: extract
            fieldActions:
              - path: a
"#,
        log_path.display()
    );
    let pipelines = parse(&yaml);
    let mut orchestrator = Orchestrator::build(&pipelines).unwrap();
    orchestrator.run().await.unwrap();
    orchestrator.shutdown().await;
}
