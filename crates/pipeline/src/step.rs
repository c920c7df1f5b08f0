//! step -- 한 레코드에 순서대로 적용되는 드라이버 목록
//!
//! step은 같은 레코드에 드라이버를 차례로 실행합니다. 어떤 드라이버가
//! 에러를 남기면 중단하고 전파하며, 빈 페이로드(제거)를 내면 중단하고
//! 아무것도 내보내지 않습니다.

use logpost_core::error::RecordError;
use logpost_core::record::Record;
use logpost_driver::Driver;

/// step 실행 결과
#[derive(Debug)]
pub enum StepOutcome {
    /// 다음 step으로 계속
    Continue,
    /// 레코드 제거됨 -- 출력 없음
    Removed,
    /// 레코드 에러 -- 에러 채널로 전파
    Failed(RecordError),
}

/// 드라이버 목록 하나
#[derive(Debug)]
pub struct Step {
    drivers: Vec<Box<dyn Driver>>,
}

impl Step {
    /// 드라이버 목록으로 step을 만듭니다.
    pub fn new(drivers: Vec<Box<dyn Driver>>) -> Self {
        Self { drivers }
    }

    /// 레코드를 step에 통과시킵니다.
    pub fn run(&self, record: &mut Record) -> StepOutcome {
        for driver in &self.drivers {
            driver.process(record);
            if let Some(err) = record.error() {
                return StepOutcome::Failed(err.clone());
            }
            if record.is_removed() || record.payload().is_empty() {
                return StepOutcome::Removed;
            }
        }
        StepOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use logpost_core::config::WorkflowSpec;
    use logpost_driver::from_workflow;

    fn driver(yaml: &str) -> Box<dyn Driver> {
        let spec: WorkflowSpec = serde_yaml::from_str(yaml).unwrap();
        from_workflow(&spec).unwrap()
    }

    #[test]
    fn drivers_run_in_sequence_on_same_record() {
        let step = Step::new(vec![
            driver(
                r#"
driver: json
method: extract
fieldActions:
  - path: a
    action: addVar(seen)
"#,
            ),
            driver(
                r#"
driver: json
method: filter
fieldActions:
  - path: a
    action: keepIf(getVar(seen))
"#,
            ),
        ]);

        let mut record = Record::new(Bytes::from_static(br#"{"a":"x"}"#));
        assert!(matches!(step.run(&mut record), StepOutcome::Continue));
    }

    #[test]
    fn removal_stops_the_step() {
        let step = Step::new(vec![
            driver(
                r#"
driver: json
method: filter
fieldActions:
  - path: a
    conditions:
      - matchString(nope)
"#,
            ),
            driver(
                r#"
driver: json
method: extract
fieldActions:
  - path: a
"#,
            ),
        ]);

        let mut record = Record::new(Bytes::from_static(br#"{"a":"x"}"#));
        assert!(matches!(step.run(&mut record), StepOutcome::Removed));
        // 제거 이후 드라이버는 실행되지 않는다
        assert!(record.fields().is_empty());
    }

    #[test]
    fn error_stops_and_propagates() {
        let step = Step::new(vec![driver(
            r#"
driver: json
method: extract
fieldActions:
  - path: missing
"#,
        )]);

        let mut record = Record::new(Bytes::from_static(br#"{"a":"x"}"#));
        assert!(matches!(
            step.run(&mut record),
            StepOutcome::Failed(RecordError::NilValue)
        ));
    }
}
