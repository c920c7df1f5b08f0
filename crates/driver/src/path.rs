//! 중첩 경로 처리 -- 점 구분 경로 파싱과 객체 내비게이션
//!
//! 경로는 점으로 구분된 키 목록입니다. 세그먼트 끝의 백슬래시는 다음
//! 세그먼트와 리터럴 점으로 병합됩니다. 예를 들어 `a.b\.c.d`는
//! `a`, `b.c`, `d` 세 개의 세그먼트를 뜻합니다.

use serde_json::{Map, Value};

use logpost_core::error::RecordError;

/// 경로 문자열을 세그먼트 목록으로 파싱합니다.
///
/// 빈 문자열은 빈 키 하나짜리 목록이 됩니다 (점 분할 의미론 유지).
pub fn parse_levels(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut levels = Vec::with_capacity(parts.len());
    let mut skip = false;
    for (n, part) in parts.iter().enumerate() {
        if skip {
            skip = false;
            continue;
        }
        if let Some(stripped) = part.strip_suffix('\\')
            && let Some(next) = parts.get(n + 1)
        {
            levels.push(format!("{stripped}.{next}"));
            skip = true;
            continue;
        }
        levels.push((*part).to_owned());
    }
    levels
}

/// 값 트리에서 경로에 해당하는 값을 찾습니다.
///
/// 빈 경로는 값 전체를 반환합니다. 중간 세그먼트가 객체가 아니면 None.
pub fn get_value_at<'a>(value: &'a Value, levels: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for level in levels {
        current = current.as_object()?.get(level)?;
    }
    Some(current)
}

/// 객체에 경로를 따라 값을 기록합니다.
///
/// 존재하지 않는 중간 세그먼트는 빈 객체로 생성되고, 객체가 아닌
/// 중간 값은 빈 객체로 덮어씁니다.
pub fn set_at(obj: &mut Map<String, Value>, levels: &[String], value: Value) {
    match levels {
        [] => {}
        [last] => {
            obj.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let child = obj
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_at(map, rest, value);
            }
        }
    }
}

/// 객체에서 경로의 말단 키를 제거하고 제거된 값을 반환합니다.
///
/// 중간 세그먼트가 객체가 아니면 에러, 말단 키가 없으면 Ok(None).
pub fn remove_at(
    obj: &mut Map<String, Value>,
    levels: &[String],
    raw_path: &str,
) -> Result<Option<Value>, RecordError> {
    match levels {
        [] => Ok(None),
        [last] => Ok(obj.remove(last)),
        [head, rest @ ..] => match obj.get_mut(head) {
            Some(Value::Object(map)) => remove_at(map, rest, raw_path),
            _ => Err(RecordError::InvalidPath(raw_path.to_owned())),
        },
    }
}

/// 경로의 부모 객체와 말단 키를 반환합니다.
///
/// 중간 세그먼트가 없거나 객체가 아니면 None.
pub fn parent_mut<'a>(
    obj: &'a mut Map<String, Value>,
    levels: &'a [String],
) -> Option<(&'a mut Map<String, Value>, &'a str)> {
    let (last, init) = levels.split_last()?;
    let mut current = obj;
    for level in init {
        current = match current.get_mut(level) {
            Some(Value::Object(map)) => map,
            _ => return None,
        };
    }
    Some((current, last))
}
