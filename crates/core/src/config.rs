//! 설정 트리 — 이미 구체화된 파이프라인 구성
//!
//! 설정 파일 파싱(YAML/JSON)은 외부(데몬)의 몫입니다. 이 모듈은
//! 역직렬화가 끝난 구성 트리와 로드 시점 검증만을 정의합니다.
//!
//! # 구조
//! ```text
//! Pipelines (이름 -> PipelineSpec)
//!   PipelineSpec { sources[], destinations[], processors[] }
//!     StageSpec { stage, steps[] }
//!       StepSpec { step, workflow: WorkflowSpec }
//! ```
//!
//! stage/step 번호는 파이프라인/stage 내에서 유일해야 하고, 오름차순으로
//! 정렬되어 실행 순서를 결정합니다. 중복 번호는 로드 시점 에러입니다.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// 이름 붙은 파이프라인들의 모음
pub type Pipelines = BTreeMap<String, PipelineSpec>;

/// 단일 파이프라인 구성
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// 소스 플러그인 구성 목록
    #[serde(default)]
    pub sources: Vec<PluginSpec>,
    /// 싱크(목적지) 플러그인 구성 목록
    #[serde(default)]
    pub destinations: Vec<PluginSpec>,
    /// 처리 stage 목록
    #[serde(default)]
    pub processors: Vec<StageSpec>,
}

impl PipelineSpec {
    /// 파이프라인 배선을 검증합니다.
    ///
    /// 싱크만 있고 소스가 없는(혹은 그 반대) 파이프라인은
    /// 로드 시점에 거부합니다.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !self.destinations.is_empty() && self.sources.is_empty() {
            return Err(ConfigError::UnresolvedPipeline {
                pipeline: name.to_owned(),
                reason: "destinations defined without any source".to_owned(),
            });
        }
        if !self.sources.is_empty() && self.destinations.is_empty() {
            return Err(ConfigError::UnresolvedPipeline {
                pipeline: name.to_owned(),
                reason: "sources defined without any destination".to_owned(),
            });
        }
        if self.sources.is_empty() && self.destinations.is_empty() {
            return Err(ConfigError::UnresolvedPipeline {
                pipeline: name.to_owned(),
                reason: "no sources or destinations defined".to_owned(),
            });
        }
        Ok(())
    }

    /// stage 번호 오름차순으로 정렬된 stage 목록을 반환합니다.
    ///
    /// 중복 stage 번호는 에러입니다.
    pub fn ordered_stages(&self, pipeline: &str) -> Result<Vec<&StageSpec>, ConfigError> {
        let mut seen = HashSet::new();
        for stage in &self.processors {
            if !seen.insert(stage.stage) {
                return Err(ConfigError::DuplicateStage {
                    pipeline: pipeline.to_owned(),
                });
            }
        }
        let mut ordered: Vec<&StageSpec> = self.processors.iter().collect();
        ordered.sort_by_key(|s| s.stage);
        Ok(ordered)
    }
}

/// 플러그인 구성 항목
///
/// `plugin` 키로 종류를 식별하고, 나머지 옵션은 열린 맵으로 보존합니다.
/// 각 플러그인이 자신의 구성 타입으로 역직렬화합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginSpec {
    /// 플러그인 종류 식별자 (file, stdout, loki 등)
    #[serde(default)]
    pub plugin: String,
    /// 플러그인별 옵션
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// stage 구성: 실행 순서와 step 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// stage 번호 (파이프라인 내 유일, 오름차순 실행)
    pub stage: i64,
    /// step 목록
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl StageSpec {
    /// step 번호 오름차순으로 정렬된 step 목록을 반환합니다.
    ///
    /// 중복 step 번호는 에러입니다.
    pub fn ordered_steps(&self, pipeline: &str) -> Result<Vec<&StepSpec>, ConfigError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.step) {
                return Err(ConfigError::DuplicateStep {
                    pipeline: pipeline.to_owned(),
                    stage: self.stage,
                });
            }
        }
        let mut ordered: Vec<&StepSpec> = self.steps.iter().collect();
        ordered.sort_by_key(|s| s.step);
        Ok(ordered)
    }
}

/// step 구성: 하나의 드라이버 workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// step 번호 (stage 내 유일, 오름차순 실행)
    pub step: i64,
    /// 드라이버 workflow 정의
    #[serde(default)]
    pub workflow: WorkflowSpec,
}

/// 드라이버 workflow 정의
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    /// 드라이버 종류 (현재 json)
    #[serde(default)]
    pub driver: String,
    /// method 종류 (extract | filter | transform)
    #[serde(default)]
    pub method: String,
    /// 경로별 action 정의
    #[serde(default)]
    pub field_actions: Vec<FieldActionSpec>,
    /// 드라이버 수준 후처리
    #[serde(default)]
    pub driver_actions: DriverActionsSpec,
}

/// 경로 하나에 대한 action 정의
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldActionSpec {
    /// JSON 경로 (점 구분, 백슬래시 이스케이프)
    #[serde(default)]
    pub path: String,
    /// action 표현식 (예: `addField(name)`). 비우면 method별 기본값.
    #[serde(default)]
    pub action: String,
    /// 조건 표현식 목록 (예: `containsString(err)`)
    #[serde(default)]
    pub conditions: Vec<String>,
}

/// 드라이버 수준 후처리 정의
///
/// 값이 `getVar(k)` / `getTag(k)` 형태의 문자열이면 해당 사이드 채널에서
/// 치환되고, 그 외에는 리터럴로 쓰입니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverActionsSpec {
    /// fields에 추가할 항목
    #[serde(default)]
    pub add_fields: Map<String, Value>,
    /// vars에 추가할 항목
    #[serde(default)]
    pub add_vars: Map<String, Value>,
    /// tags에 추가할 항목
    #[serde(default)]
    pub add_tags: BTreeMap<String, String>,
}

impl DriverActionsSpec {
    /// 후처리 항목이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.add_fields.is_empty() && self.add_vars.is_empty() && self.add_tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(n: i64, steps: Vec<StepSpec>) -> StageSpec {
        StageSpec { stage: n, steps }
    }

    fn step(n: i64) -> StepSpec {
        StepSpec {
            step: n,
            workflow: WorkflowSpec::default(),
        }
    }

    #[test]
    fn ordered_stages_sorts_ascending() {
        let spec = PipelineSpec {
            processors: vec![stage(3, vec![]), stage(1, vec![]), stage(2, vec![])],
            ..Default::default()
        };
        let ordered = spec.ordered_stages("p").unwrap();
        let numbers: Vec<i64> = ordered.iter().map(|s| s.stage).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_stage_numbers_rejected() {
        let spec = PipelineSpec {
            processors: vec![stage(1, vec![]), stage(1, vec![])],
            ..Default::default()
        };
        let err = spec.ordered_stages("p").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStage { .. }));
    }

    #[test]
    fn ordered_steps_sorts_and_rejects_duplicates() {
        let ok = stage(1, vec![step(2), step(1)]);
        let numbers: Vec<i64> = ok
            .ordered_steps("p")
            .unwrap()
            .iter()
            .map(|s| s.step)
            .collect();
        assert_eq!(numbers, vec![1, 2]);

        let dup = stage(1, vec![step(1), step(1)]);
        assert!(matches!(
            dup.ordered_steps("p").unwrap_err(),
            ConfigError::DuplicateStep { .. }
        ));
    }

    #[test]
    fn validate_rejects_half_wired_pipeline() {
        let only_dest = PipelineSpec {
            destinations: vec![PluginSpec {
                plugin: "stdout".to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            only_dest.validate("p").unwrap_err(),
            ConfigError::UnresolvedPipeline { .. }
        ));
    }

    #[test]
    fn workflow_spec_deserializes_from_yaml() {
        let yaml = r#"
driver: json
method: extract
fieldActions:
  - path: message
    action: addField(msg)
    conditions:
      - containsString(err)
driverActions:
  addTags:
    source: getVar(origin)
"#;
        let spec: WorkflowSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.driver, "json");
        assert_eq!(spec.method, "extract");
        assert_eq!(spec.field_actions.len(), 1);
        assert_eq!(spec.field_actions[0].action, "addField(msg)");
        assert_eq!(
            spec.driver_actions.add_tags.get("source"),
            Some(&"getVar(origin)".to_owned())
        );
    }

    #[test]
    fn plugin_spec_keeps_open_options() {
        let yaml = r#"
plugin: file
path: /var/log/app.log
startBeginning: true
"#;
        let spec: PluginSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.plugin, "file");
        assert_eq!(
            spec.options.get("path").and_then(|v| v.as_str()),
            Some("/var/log/app.log")
        );
        assert_eq!(
            spec.options.get("startBeginning").and_then(|v| v.as_bool()),
            Some(true)
        );
    }
}
