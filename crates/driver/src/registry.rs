//! 구성 -> 드라이버 컴파일
//!
//! workflow 구성을 검증하고 실행 가능한 드라이버로 컴파일합니다.
//! 알 수 없는 드라이버/method/action/술어, 빠진 경로나 인자는 모두
//! 여기서 거부됩니다. 런타임에는 구성 문자열을 다시 파싱하지 않습니다.

use logpost_core::config::{FieldActionSpec, WorkflowSpec};
use logpost_core::error::ConfigError;

use crate::Driver;
use crate::action::{Action, CompiledAction, FieldWrite, TagWrite};
use crate::expr::{Getter, parse_function};
use crate::extract::{Extractor, Method};
use crate::json::{DriverActions, JsonDriver};
use crate::path::parse_levels;
use crate::predicate::Predicate;

/// workflow 구성에서 드라이버를 생성합니다.
pub fn from_workflow(spec: &WorkflowSpec) -> Result<Box<dyn Driver>, ConfigError> {
    match spec.driver.as_str() {
        "json" => Ok(Box::new(build_json_driver(spec)?)),
        "" => Err(ConfigError::UnknownDriver("(none)".to_owned())),
        other => Err(ConfigError::UnknownDriver(other.to_owned())),
    }
}

/// JSON 드라이버를 컴파일합니다.
fn build_json_driver(spec: &WorkflowSpec) -> Result<JsonDriver, ConfigError> {
    let method = Method::parse(&spec.method)?;

    let mut actions = Vec::with_capacity(spec.field_actions.len());
    for field in &spec.field_actions {
        if field.path.is_empty() {
            return Err(ConfigError::MissingPath {
                method: spec.method.clone(),
            });
        }
        let (action_name, argument) = resolve_action(method, field)?;
        tracing::debug!(
            method = %spec.method,
            action = %action_name,
            path = %field.path,
            conditions = field.conditions.len(),
            "compiling field action"
        );
        let predicates = compile_predicates(&action_name, &field.conditions)?;
        let action = build_action(method, &action_name, &argument, &field.path)?;
        actions.push(CompiledAction::new(action, predicates));
    }

    let driver_actions = DriverActions::from_spec(&spec.driver_actions);
    Ok(JsonDriver::new(actions, driver_actions))
}

/// action 표현식을 (이름, 인자)로 해석합니다.
///
/// 비어 있는 action은 method별 기본값으로 채워지고, 인자가 없는
/// action은 경로를 인자로 씁니다 (허용된 action에 한해).
fn resolve_action(
    method: Method,
    field: &FieldActionSpec,
) -> Result<(String, String), ConfigError> {
    if field.action.is_empty() {
        return match method {
            Method::Extract => Ok(("addField".to_owned(), field.path.clone())),
            Method::Filter => Ok(("keep".to_owned(), field.path.clone())),
            Method::Transform => Err(ConfigError::UnknownAction {
                path: field.path.clone(),
                action: "(none)".to_owned(),
            }),
        };
    }

    let Some((name, argument)) = parse_function(&field.action) else {
        return Err(ConfigError::UnknownAction {
            path: field.path.clone(),
            action: field.action.clone(),
        });
    };

    if argument.is_empty() {
        return match name {
            "drop" | "exists" | "keep" | "remove" => Ok((name.to_owned(), field.path.clone())),
            _ => Err(ConfigError::InvalidActionArgument {
                path: field.path.clone(),
                reason: format!("missing action value for {name}"),
            }),
        };
    }

    Ok((name.to_owned(), argument.to_owned()))
}

/// action별 허용 술어 테이블
fn condition_allowed(action: &str, condition: &str) -> bool {
    const CONDITIONS: [&str; 3] = ["containsString", "matchString", "matchRegex"];
    const ACTIONS: [&str; 10] = [
        "addField",
        "addTag",
        "addVar",
        "remove",
        "keep",
        "keepIf",
        "drop",
        "changeField",
        "changeValue",
        "changeJSON",
    ];
    ACTIONS.contains(&action) && CONDITIONS.contains(&condition)
}

/// 조건 목록을 술어로 컴파일합니다.
fn compile_predicates(
    action: &str,
    conditions: &[String],
) -> Result<Vec<Predicate>, ConfigError> {
    let mut predicates = Vec::with_capacity(conditions.len());
    for condition in conditions {
        let Some((name, argument)) = parse_function(condition) else {
            return Err(ConfigError::UnknownPredicate {
                action: action.to_owned(),
                condition: condition.clone(),
            });
        };
        if !condition_allowed(action, name) {
            return Err(ConfigError::UnknownPredicate {
                action: action.to_owned(),
                condition: name.to_owned(),
            });
        }
        let Some(predicate) = Predicate::compile(name, argument) else {
            return Err(ConfigError::UnknownPredicate {
                action: action.to_owned(),
                condition: name.to_owned(),
            });
        };
        predicates.push(predicate);
    }
    Ok(predicates)
}

/// method + action 이름으로 실행 가능한 action을 만듭니다.
fn build_action(
    method: Method,
    action: &str,
    argument: &str,
    path: &str,
) -> Result<Action, ConfigError> {
    let extractor = Extractor::compile(method, path);

    let field_write = |arg: &str| {
        FieldWrite::parse(arg).ok_or_else(|| ConfigError::InvalidActionArgument {
            path: path.to_owned(),
            reason: format!("invalid option {arg:?} for {action}"),
        })
    };
    let tag_write = |arg: &str| {
        TagWrite::parse(arg).ok_or_else(|| ConfigError::InvalidActionArgument {
            path: path.to_owned(),
            reason: format!("invalid option {arg:?} for {action}"),
        })
    };

    match (method, action) {
        (Method::Extract, "addField") => Ok(Action::AddField {
            target: field_write(argument)?,
            extractor,
        }),
        (Method::Extract, "addTag") => Ok(Action::AddTag {
            target: tag_write(argument)?,
            extractor,
        }),
        (Method::Extract, "addVar") => Ok(Action::AddVar {
            name: argument.to_owned(),
            extractor,
        }),

        (Method::Filter, "remove" | "removeIf") => Ok(Action::Remove { extractor }),
        (Method::Filter, "keep") => Ok(Action::Keep { extractor }),
        (Method::Filter, "keepIf") => Ok(Action::KeepIf {
            getter: Getter::parse(argument).ok_or_else(|| {
                ConfigError::InvalidActionArgument {
                    path: path.to_owned(),
                    reason: format!("invalid option {argument:?} for keepIf"),
                }
            })?,
        }),
        (Method::Filter, "addTag") => Ok(Action::FilterAddTag {
            target: tag_write(argument)?,
            extractor,
        }),

        (Method::Transform, "drop") => Ok(Action::Drop {
            path: argument.to_owned(),
            levels: parse_levels(argument),
        }),
        (Method::Transform, "changeField") => Ok(Action::ChangeField {
            name: argument.to_owned(),
            levels: parse_levels(path),
        }),
        (Method::Transform, "changeValue") => Ok(Action::ChangeValue {
            name: argument.to_owned(),
            levels: parse_levels(path),
        }),
        (Method::Transform, "changeJSON") => Ok(Action::ChangeJson {
            levels: parse_levels(path),
        }),
        (Method::Transform, "addTag") => Ok(Action::TransformAddTag {
            target: tag_write(argument)?,
            levels: parse_levels(path),
        }),

        _ => Err(ConfigError::UnknownAction {
            path: path.to_owned(),
            action: action.to_owned(),
        }),
    }
}
