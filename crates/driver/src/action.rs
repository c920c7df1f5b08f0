//! action -- 술어로 보호되는 레코드 변형 연산
//!
//! action은 설정 로드 시점에 [`CompiledAction`]으로 컴파일되고,
//! 런타임에는 레코드에 대한 평가만 수행합니다. method가 null 값을
//! 돌려주면 레코드는 에러로 종료됩니다 (명시된 예외 제외).
//!
//! transform 계열 action은 작업 객체(지금까지 구축된 fields, 비어
//! 있으면 페이로드를 객체로 재해석한 것) 위에서 동작하며, 술어
//! 게이트를 통과했을 때만 결과를 fields에 커밋합니다.

use serde_json::{Map, Value};

use logpost_core::error::RecordError;
use logpost_core::record::Record;

use crate::expr::Getter;
use crate::extract::Extractor;
use crate::path::{parent_mut, remove_at, set_at};
use crate::predicate::{Predicate, any_match, render};

/// fields 기록 대상
#[derive(Debug, Clone)]
pub enum FieldWrite {
    /// 경로 세그먼트를 따라 기록 (중첩 생성)
    Path(Vec<String>),
    /// `"k,lit"` 형태: 고정 키에 리터럴 문자열 기록
    Literal { key: String, value: String },
}

/// tags 기록 대상
#[derive(Debug, Clone)]
pub enum TagWrite {
    /// 추출 값을 태그로 기록
    Key(String),
    /// `"k,lit"` 형태: 고정 키에 리터럴 기록
    Literal { key: String, value: String },
}

/// 쉼표 하나짜리 `"k,lit"` 인자를 분해합니다.
///
/// 쉼표가 둘 이상이면 잘못된 인자입니다 (로드 시점 에러).
fn split_literal(name: &str) -> Option<(String, String)> {
    let mut parts = name.splitn(3, ',');
    let key = parts.next()?;
    let value = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((key.to_owned(), value.to_owned()))
}

impl FieldWrite {
    /// action 인자를 기록 대상으로 컴파일합니다.
    ///
    /// 쉼표가 둘 이상이면 None.
    pub fn parse(name: &str) -> Option<Self> {
        if name.contains(',') {
            let (key, value) = split_literal(name)?;
            return Some(Self::Literal { key, value });
        }
        Some(Self::Path(crate::path::parse_levels(name)))
    }
}

impl TagWrite {
    /// action 인자를 태그 기록 대상으로 컴파일합니다.
    pub fn parse(name: &str) -> Option<Self> {
        if name.contains(',') {
            let (key, value) = split_literal(name)?;
            return Some(Self::Literal { key, value });
        }
        Some(Self::Key(name.to_owned()))
    }
}

/// 컴파일된 action 종류
#[derive(Debug, Clone)]
pub enum Action {
    /// 추출 값을 fields에 기록
    AddField { target: FieldWrite, extractor: Extractor },
    /// 추출 값을 tags에 기록
    AddTag { target: TagWrite, extractor: Extractor },
    /// 추출 값을 vars에 기록
    AddVar { name: String, extractor: Extractor },
    /// 술어 통과 시 유지, 실패 시 제거
    Keep { extractor: Extractor },
    /// 사이드 채널 값 존재 + 술어 통과 시 유지
    KeepIf { getter: Getter },
    /// 술어 통과 시 태그를 비우고 제거
    Remove { extractor: Extractor },
    /// 술어 통과 시 태그 추가, 실패 시 제거 (filter 전용 addTag)
    FilterAddTag { target: TagWrite, extractor: Extractor },
    /// 작업 객체에서 경로의 키 삭제
    Drop { path: String, levels: Vec<String> },
    /// 경로의 키 이름을 변경 (값 유지)
    ChangeField { name: String, levels: Vec<String> },
    /// 경로의 값을 리터럴 문자열로 교체 (키 유지)
    ChangeValue { name: String, levels: Vec<String> },
    /// 경로의 값(객체 또는 JSON 문자열)으로 fields 전체 교체
    ChangeJson { levels: Vec<String> },
    /// 작업 객체 기준으로 태그 추가 (transform 전용 addTag)
    TransformAddTag { target: TagWrite, levels: Vec<String> },
}

/// 술어 목록과 결합된 실행 단위
#[derive(Debug, Clone)]
pub struct CompiledAction {
    action: Action,
    predicates: Vec<Predicate>,
}

impl CompiledAction {
    /// action과 술어 목록을 결합합니다.
    pub fn new(action: Action, predicates: Vec<Predicate>) -> Self {
        Self { action, predicates }
    }

    /// 레코드에 action을 적용합니다.
    ///
    /// 에러는 레코드에 기록되고, 호출자는 `record.error()`로 확인합니다.
    pub fn apply(&self, record: &mut Record) {
        match &self.action {
            Action::AddField { target, extractor } => {
                let Some(value) = extractor.extract(record.payload()) else {
                    record.fail(RecordError::NilValue);
                    return;
                };
                if !any_match(&self.predicates, &value) {
                    return;
                }
                match target {
                    FieldWrite::Literal { key, value: lit } => {
                        record.fields().add(key.clone(), Value::String(lit.clone()));
                    }
                    FieldWrite::Path(levels) if levels.len() == 1 => {
                        record.fields().add(levels[0].clone(), value);
                    }
                    FieldWrite::Path(levels) => {
                        let mut snapshot = record.fields().snapshot();
                        set_at(&mut snapshot, levels, value);
                        record.fields().replace(snapshot);
                    }
                }
            }

            Action::AddTag { target, extractor } => {
                let Some(value) = extractor.extract(record.payload()) else {
                    record.fail(RecordError::NilValue);
                    return;
                };
                if any_match(&self.predicates, &value) {
                    write_tag(record, target, &value);
                }
            }

            Action::AddVar { name, extractor } => {
                let Some(value) = extractor.extract(record.payload()) else {
                    record.fail(RecordError::NilValue);
                    return;
                };
                if any_match(&self.predicates, &value) {
                    record.vars().add(name.clone(), value);
                }
            }

            Action::Keep { extractor } => {
                let Some(value) = extractor.extract(record.payload()) else {
                    record.fail(RecordError::NilValue);
                    return;
                };
                if !any_match(&self.predicates, &value) {
                    record.mark_removed();
                }
            }

            Action::KeepIf { getter } => match getter.fetch(record) {
                Some(value) => {
                    if !any_match(&self.predicates, &value) {
                        record.mark_removed();
                    }
                }
                None => record.mark_removed(),
            },

            Action::Remove { extractor } => {
                let Some(value) = extractor.extract(record.payload()) else {
                    record.fail(RecordError::NilValue);
                    return;
                };
                if any_match(&self.predicates, &value) {
                    record.tags().clear();
                    record.mark_removed();
                }
            }

            Action::FilterAddTag { target, extractor } => {
                let Some(value) = extractor.extract(record.payload()) else {
                    record.fail(RecordError::NilValue);
                    return;
                };
                if any_match(&self.predicates, &value) {
                    write_tag(record, target, &value);
                } else {
                    record.mark_removed();
                }
            }

            Action::Drop { path, levels } => {
                let mut work = match working_object(record) {
                    Ok(w) => w,
                    Err(e) => {
                        record.fail(e);
                        return;
                    }
                };
                let removed = match remove_at(&mut work, levels, path) {
                    Ok(v) => v,
                    Err(e) => {
                        record.fail(e);
                        return;
                    }
                };
                let target = removed.unwrap_or(Value::Null);
                if any_match(&self.predicates, &target) {
                    record.fields().replace(work);
                }
            }

            Action::ChangeField { name, levels } => {
                let mut work = match working_object(record) {
                    Ok(w) => w,
                    Err(e) => {
                        record.fail(e);
                        return;
                    }
                };
                match get_at(&work, levels).cloned() {
                    None => {
                        if any_match(&self.predicates, &Value::Null) {
                            record.fields().replace(work);
                        }
                    }
                    Some(old) => {
                        if !any_match(&self.predicates, &old) {
                            return;
                        }
                        if let Some((parent, last)) = parent_mut(&mut work, levels)
                            && let Some(value) = parent.remove(last)
                        {
                            parent.insert(name.clone(), value);
                        }
                        record.fields().replace(work);
                    }
                }
            }

            Action::ChangeValue { name, levels } => {
                let mut work = match working_object(record) {
                    Ok(w) => w,
                    Err(e) => {
                        record.fail(e);
                        return;
                    }
                };
                match get_at(&work, levels).cloned() {
                    None => {
                        if any_match(&self.predicates, &Value::Null) {
                            record.fields().replace(work);
                        }
                    }
                    Some(old) => {
                        if !any_match(&self.predicates, &old) {
                            return;
                        }
                        if let Some((parent, last)) = parent_mut(&mut work, levels) {
                            parent.insert(last.to_owned(), Value::String(name.clone()));
                        }
                        record.fields().replace(work);
                    }
                }
            }

            Action::ChangeJson { levels } => {
                let work = match working_object(record) {
                    Ok(w) => w,
                    Err(e) => {
                        record.fail(e);
                        return;
                    }
                };
                let Some(target) = get_at(&work, levels).cloned() else {
                    record.fail(RecordError::NilValue);
                    return;
                };
                let new_fields = match &target {
                    Value::Object(map) => map.clone(),
                    Value::String(s) => match serde_json::from_str::<Value>(s) {
                        Ok(Value::Object(map)) => map,
                        _ => {
                            record.fail(RecordError::InvalidJson(s.clone()));
                            return;
                        }
                    },
                    other => {
                        record.fail(RecordError::InvalidJson(render(other)));
                        return;
                    }
                };
                if any_match(&self.predicates, &target) {
                    record.fields().replace(new_fields);
                }
            }

            Action::TransformAddTag { target, levels } => {
                let work = match working_object(record) {
                    Ok(w) => w,
                    Err(e) => {
                        record.fail(e);
                        return;
                    }
                };
                let Some(value) = get_at(&work, levels).cloned() else {
                    record.fail(RecordError::NilValue);
                    return;
                };
                if any_match(&self.predicates, &value) {
                    write_tag(record, target, &value);
                }
            }
        }
    }
}

/// 태그 기록 공통 경로
fn write_tag(record: &Record, target: &TagWrite, value: &Value) {
    match target {
        TagWrite::Literal { key, value: lit } => record.tags().add(key.clone(), lit.clone()),
        TagWrite::Key(name) => record.tags().add(name.clone(), render(value)),
    }
}

/// transform 계열 action의 작업 객체를 만듭니다.
///
/// 구축 중인 fields가 있으면 그 스냅샷, 없으면 페이로드를 객체로
/// 재해석합니다. 객체가 아니면 레코드 에러입니다.
fn working_object(record: &Record) -> Result<Map<String, Value>, RecordError> {
    let fields = record.fields().snapshot();
    if !fields.is_empty() {
        return Ok(fields);
    }
    match serde_json::from_slice::<Value>(record.payload()) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(RecordError::NotAnObject),
    }
}

/// 작업 객체에서 경로의 값을 찾습니다.
fn get_at<'a>(map: &'a Map<String, Value>, levels: &[String]) -> Option<&'a Value> {
    let (first, rest) = levels.split_first()?;
    let mut current = map.get(first)?;
    for level in rest {
        current = current.as_object()?.get(level)?;
    }
    Some(current)
}
