//! 구성 트리 -> stage 빌드
//!
//! stage/step 번호를 정렬·검증하고, 각 step의 workflow를 드라이버로
//! 컴파일합니다. 잘못된 구성은 전부 여기서 (로드 시점에) 실패합니다.

use tracing::debug;

use logpost_core::config::PipelineSpec;
use logpost_core::error::ConfigError;
use logpost_driver::from_workflow;

use crate::stage::Stage;
use crate::step::Step;

/// 파이프라인 구성에서 stage 목록을 빌드합니다.
pub fn build_stages(name: &str, spec: &PipelineSpec) -> Result<Vec<Stage>, ConfigError> {
    let ordered_stages = spec.ordered_stages(name)?;
    debug!(pipeline = name, stages = ordered_stages.len(), "building stages");

    let mut stages = Vec::with_capacity(ordered_stages.len());
    for stage_spec in ordered_stages {
        let ordered_steps = stage_spec.ordered_steps(name)?;
        let mut steps = Vec::with_capacity(ordered_steps.len());
        for step_spec in ordered_steps {
            let driver = from_workflow(&step_spec.workflow).map_err(|e| {
                ConfigError::InvalidValue {
                    field: format!(
                        "{name} stage {} step {}",
                        stage_spec.stage, step_spec.step
                    ),
                    reason: e.to_string(),
                }
            })?;
            steps.push(Step::new(vec![driver]));
        }
        debug!(
            pipeline = name,
            stage = stage_spec.stage,
            steps = steps.len(),
            "stage built"
        );
        stages.push(Stage::new(steps));
    }
    Ok(stages)
}
