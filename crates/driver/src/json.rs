//! JSON 드라이버 -- action 시퀀스, 드라이버 후처리, 마무리 직렬화
//!
//! [`JsonDriver`]는 컴파일된 action 목록을 순서대로 실행하고,
//! `driverActions`를 적용한 뒤 사이드 채널을 페이로드 바이트로
//! 직렬화합니다.
//!
//! # 마무리 규칙
//! - fields와 tags가 모두 비어 있으면 원본 페이로드 유지
//! - fields는 없고 tags만 있으면 페이로드를 객체로 재해석해 `tags` 키 삽입
//! - fields가 있으면 fields를 직렬화하고, tags가 있으면 `tags` 키로 병합

use bytes::Bytes;
use serde_json::{Map, Value};

use logpost_core::config::DriverActionsSpec;
use logpost_core::error::RecordError;
use logpost_core::record::Record;

use crate::Driver;
use crate::action::CompiledAction;
use crate::expr::Getter;
use crate::path::{parse_levels, set_at};

/// 직렬화 시 태그가 병합되는 예약 최상위 키
pub const TAGS_KEY: &str = "tags";

/// 드라이버 후처리 값 템플릿
///
/// `getVar(k)` / `getTag(k)` 형태의 문자열은 로드 시점에 getter로
/// 컴파일되고, 나머지는 리터럴로 유지됩니다.
#[derive(Debug, Clone)]
enum TemplateValue {
    /// 리터럴 값
    Literal(Value),
    /// 사이드 채널 참조
    Getter(Getter),
    /// 원소별로 치환되는 배열
    Array(Vec<TemplateValue>),
}

impl TemplateValue {
    fn compile(value: &Value) -> Self {
        match value {
            Value::String(s) => match Getter::parse(s) {
                Some(getter) => Self::Getter(getter),
                None => Self::Literal(value.clone()),
            },
            Value::Array(items) => Self::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => match Getter::parse(s) {
                            Some(getter) => Self::Getter(getter),
                            None => Self::Literal(item.clone()),
                        },
                        other => Self::Literal(other.clone()),
                    })
                    .collect(),
            ),
            other => Self::Literal(other.clone()),
        }
    }

    fn resolve(&self, record: &Record) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Getter(getter) => getter.fetch(record),
            Self::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.resolve(record).unwrap_or(Value::Null))
                    .collect(),
            )),
        }
    }
}

/// 태그 후처리 템플릿 -- 문자열 결과만 기록됩니다.
#[derive(Debug, Clone)]
enum TagTemplate {
    Literal(String),
    Getter(Getter),
}

impl TagTemplate {
    fn compile(value: &str) -> Self {
        match Getter::parse(value) {
            Some(getter) => Self::Getter(getter),
            None => Self::Literal(value.to_owned()),
        }
    }

    fn resolve(&self, record: &Record) -> Option<String> {
        match self {
            Self::Literal(s) => Some(s.clone()),
            Self::Getter(getter) => match getter.fetch(record) {
                Some(Value::String(s)) => Some(s),
                _ => None,
            },
        }
    }
}

/// 컴파일된 드라이버 후처리
#[derive(Debug, Clone, Default)]
pub(crate) struct DriverActions {
    add_fields: Vec<(Vec<String>, TemplateValue)>,
    add_vars: Vec<(String, TemplateValue)>,
    add_tags: Vec<(String, TagTemplate)>,
}

impl DriverActions {
    /// 구성에서 후처리 템플릿을 컴파일합니다.
    pub(crate) fn from_spec(spec: &DriverActionsSpec) -> Self {
        Self {
            add_fields: spec
                .add_fields
                .iter()
                .map(|(key, value)| (parse_levels(key), TemplateValue::compile(value)))
                .collect(),
            add_vars: spec
                .add_vars
                .iter()
                .map(|(key, value)| (key.clone(), TemplateValue::compile(value)))
                .collect(),
            add_tags: spec
                .add_tags
                .iter()
                .map(|(key, value)| (key.clone(), TagTemplate::compile(value)))
                .collect(),
        }
    }
}

/// JSON 드라이버
///
/// action 목록과 드라이버 후처리로 구성된 단일 처리 단위입니다.
/// 구성 검증은 전부 [`crate::registry`]에서 끝나 있습니다.
#[derive(Debug, Clone)]
pub struct JsonDriver {
    actions: Vec<CompiledAction>,
    driver_actions: DriverActions,
}

impl JsonDriver {
    pub(crate) fn new(actions: Vec<CompiledAction>, driver_actions: DriverActions) -> Self {
        Self {
            actions,
            driver_actions,
        }
    }

    /// vars -> fields -> tags 순으로 후처리를 적용합니다.
    fn apply_driver_actions(&self, record: &mut Record) {
        for (key, template) in &self.driver_actions.add_vars {
            if let Some(value) = template.resolve(record) {
                record.vars().add(key.clone(), value);
            }
        }
        for (levels, template) in &self.driver_actions.add_fields {
            let Some(value) = template.resolve(record) else {
                continue;
            };
            if levels.len() == 1 {
                record.fields().add(levels[0].clone(), value);
            } else {
                let mut snapshot = record.fields().snapshot();
                set_at(&mut snapshot, levels, value);
                record.fields().replace(snapshot);
            }
        }
        for (key, template) in &self.driver_actions.add_tags {
            if let Some(value) = template.resolve(record) {
                record.tags().add(key.clone(), value);
            }
        }
    }

    /// 사이드 채널을 페이로드 바이트로 직렬화합니다.
    fn finalize(&self, record: &mut Record) {
        let fields = record.fields().snapshot();
        let tags = record.tags().snapshot();

        let mut object = if fields.is_empty() {
            if tags.is_empty() {
                // 아무 것도 구축되지 않았으면 원본 바이트 그대로
                return;
            }
            match serde_json::from_slice::<Value>(record.payload()) {
                Ok(Value::Object(map)) => map,
                _ => {
                    record.fail(RecordError::NotAnObject);
                    return;
                }
            }
        } else {
            fields
        };

        if !tags.is_empty() {
            let tag_map: Map<String, Value> = tags
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            object.insert(TAGS_KEY.to_owned(), Value::Object(tag_map));
        }

        match serde_json::to_vec(&Value::Object(object)) {
            Ok(bytes) => record.set_payload(Bytes::from(bytes)),
            Err(e) => record.fail(RecordError::Serialize(e.to_string())),
        }
    }
}

impl Driver for JsonDriver {
    fn process(&self, record: &mut Record) {
        for action in &self.actions {
            action.apply(record);
            if record.error().is_some() {
                return;
            }
        }
        if record.is_removed() && record.tags().is_empty() {
            record.set_payload(Bytes::new());
            return;
        }
        self.apply_driver_actions(record);
        self.finalize(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, FieldWrite};
    use crate::extract::{Extractor, Method};
    use serde_json::json;

    fn driver_with_actions(actions: Vec<CompiledAction>) -> JsonDriver {
        JsonDriver::new(actions, DriverActions::default())
    }

    fn add_field(path: &str) -> CompiledAction {
        CompiledAction::new(
            Action::AddField {
                target: FieldWrite::parse(path).unwrap(),
                extractor: Extractor::compile(Method::Extract, path),
            },
            vec![],
        )
    }

    #[test]
    fn extracted_field_becomes_payload() {
        let driver = driver_with_actions(vec![add_field("a")]);
        let mut record = Record::new(Bytes::from_static(br#"{"a":"hello","b":2}"#));
        driver.process(&mut record);

        assert!(record.error().is_none());
        assert_eq!(record.payload().as_ref(), br#"{"a":"hello"}"#);
    }

    #[test]
    fn untouched_record_keeps_original_bytes() {
        let driver = driver_with_actions(vec![]);
        let mut record = Record::new(Bytes::from_static(br#"{"raw":true}"#));
        driver.process(&mut record);
        assert_eq!(record.payload().as_ref(), br#"{"raw":true}"#);
    }

    #[test]
    fn tags_merge_into_original_payload() {
        let driver = driver_with_actions(vec![]);
        let mut record = Record::new(Bytes::from_static(br#"{"msg":"hi"}"#));
        record.tags().add("env", "prod");
        driver.process(&mut record);

        let value: Value = serde_json::from_slice(record.payload()).unwrap();
        assert_eq!(value, json!({"msg": "hi", "tags": {"env": "prod"}}));
    }

    #[test]
    fn tags_merge_into_built_fields() {
        let driver = driver_with_actions(vec![add_field("a")]);
        let mut record = Record::new(Bytes::from_static(br#"{"a":1}"#));
        record.tags().add("team", "infra");
        driver.process(&mut record);

        let value: Value = serde_json::from_slice(record.payload()).unwrap();
        assert_eq!(value, json!({"a": 1, "tags": {"team": "infra"}}));
    }

    #[test]
    fn tags_on_non_object_payload_is_error() {
        let driver = driver_with_actions(vec![]);
        let mut record = Record::new(Bytes::from_static(b"plain line"));
        record.tags().add("env", "prod");
        driver.process(&mut record);
        assert!(matches!(record.error(), Some(RecordError::NotAnObject)));
    }

    #[test]
    fn removed_record_without_tags_emits_empty_payload() {
        let never = crate::predicate::Predicate::compile("containsString", "never").unwrap();
        let remove_all = CompiledAction::new(
            Action::Keep {
                extractor: Extractor::compile(Method::Filter, "a"),
            },
            vec![never],
        );

        let driver = driver_with_actions(vec![remove_all]);
        let mut record = Record::new(Bytes::from_static(br#"{"a":"hello"}"#));
        driver.process(&mut record);

        assert!(record.is_removed());
        assert!(record.payload().is_empty());
    }

    #[test]
    fn error_stops_action_sequence() {
        let failing = add_field("missing");
        let after = add_field("a");
        let driver = driver_with_actions(vec![failing, after]);
        let mut record = Record::new(Bytes::from_static(br#"{"a":1}"#));
        driver.process(&mut record);

        assert!(matches!(record.error(), Some(RecordError::NilValue)));
        // 후속 action은 실행되지 않는다
        assert!(record.fields().is_empty());
    }

    #[test]
    fn driver_actions_substitute_from_side_channels() {
        let spec: DriverActionsSpec = serde_yaml::from_str(
            r#"
addVars:
  copied: getTag(env)
addFields:
  origin: getVar(origin)
  static: fixed
addTags:
  env: prod
  from_var: getVar(label)
  skipped: getVar(not_a_string)
"#,
        )
        .unwrap();
        let driver = JsonDriver::new(vec![], DriverActions::from_spec(&spec));

        let mut record = Record::new(Bytes::from_static(br#"{"x":1}"#));
        record.vars().add("origin", json!("file:/var/log"));
        record.vars().add("label", json!("beats"));
        record.vars().add("not_a_string", json!(17));
        record.tags().add("env", "prod");
        driver.process(&mut record);

        assert_eq!(record.vars().get("copied"), Some(json!("prod")));
        assert_eq!(record.fields().get("origin"), Some(json!("file:/var/log")));
        assert_eq!(record.fields().get("static"), Some(json!("fixed")));
        assert_eq!(record.tags().get("from_var"), Some("beats".to_owned()));
        // 문자열이 아닌 getter 결과는 태그로 기록되지 않는다
        assert_eq!(record.tags().get("skipped"), None);
    }

    #[test]
    fn driver_actions_skip_missing_getters() {
        let spec: DriverActionsSpec = serde_yaml::from_str(
            r#"
addVars:
  absent: getVar(nope)
"#,
        )
        .unwrap();
        let driver = JsonDriver::new(vec![], DriverActions::from_spec(&spec));
        let mut record = Record::new(Bytes::from_static(br#"{"x":1}"#));
        driver.process(&mut record);
        assert_eq!(record.vars().get("absent"), None);
    }

    #[test]
    fn driver_actions_substitute_array_elements() {
        let spec: DriverActionsSpec = serde_yaml::from_str(
            r#"
addFields:
  sources:
    - getVar(first)
    - literal
    - getVar(missing)
"#,
        )
        .unwrap();
        let driver = JsonDriver::new(vec![], DriverActions::from_spec(&spec));
        let mut record = Record::new(Bytes::from_static(br#"{"x":1}"#));
        record.vars().add("first", json!("one"));
        driver.process(&mut record);

        assert_eq!(
            record.fields().get("sources"),
            Some(json!(["one", "literal", null]))
        );
    }

    #[test]
    fn driver_actions_nested_field_names() {
        let spec: DriverActionsSpec = serde_yaml::from_str(
            r#"
addFields:
  meta.kind: forwarded
"#,
        )
        .unwrap();
        let driver = JsonDriver::new(vec![], DriverActions::from_spec(&spec));
        let mut record = Record::new(Bytes::from_static(br#"{"x":1}"#));
        driver.process(&mut record);

        assert_eq!(record.fields().get("meta"), Some(json!({"kind": "forwarded"})));
    }
}
