//! method 함수 -- 레코드 바이트에서 값을 꺼내는 추출기
//!
//! method는 레코드의 현재 바이트를 JSON 경로의 값으로 사상하는 순수
//! 함수입니다. `extract`와 `filter`는 별개의 추출기를 가집니다:
//! `filter`의 `.` 경로는 항상 null을 돌려줘 모든 레코드를 거부하는
//! 필터를 표현할 수 있습니다.

use serde_json::Value;

use logpost_core::error::ConfigError;

use crate::path::{get_value_at, parse_levels};

/// 드라이버 method 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// 값 추출 (addField / addTag / addVar)
    Extract,
    /// 레코드 통과 여부 판정 (keep / remove / ...)
    Filter,
    /// 필드 재작성 (drop / changeField / ...)
    Transform,
}

impl Method {
    /// method 이름을 파싱합니다.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "extract" => Ok(Self::Extract),
            "filter" => Ok(Self::Filter),
            "transform" => Ok(Self::Transform),
            other => Err(ConfigError::UnknownMethod(other.to_owned())),
        }
    }

    /// method 이름을 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Filter => "filter",
            Self::Transform => "transform",
        }
    }
}

/// 컴파일된 추출기
#[derive(Debug, Clone)]
pub enum Extractor {
    /// 레코드 전체를 디코딩 (extract의 `.` 경로)
    Whole,
    /// 경로의 값을 디코딩
    At(Vec<String>),
    /// 항상 null (filter의 `.` 경로)
    Nothing,
}

impl Extractor {
    /// method와 경로로 추출기를 컴파일합니다.
    pub fn compile(method: Method, path: &str) -> Self {
        match (method, path) {
            (Method::Extract, ".") => Self::Whole,
            (Method::Filter, ".") => Self::Nothing,
            _ => Self::At(parse_levels(path)),
        }
    }

    /// 바이트에서 값을 추출합니다.
    ///
    /// `Whole`은 JSON 디코딩에 실패하면 바이트의 문자열 표현으로
    /// 폴백합니다. `At`은 경로가 없거나 JSON이 아니면 None.
    pub fn extract(&self, data: &[u8]) -> Option<Value> {
        match self {
            Self::Whole => match serde_json::from_slice::<Value>(data) {
                Ok(value) => Some(value),
                Err(_) => Some(Value::String(String::from_utf8_lossy(data).into_owned())),
            },
            Self::At(levels) => {
                let value = serde_json::from_slice::<Value>(data).ok()?;
                get_value_at(&value, levels).cloned()
            }
            Self::Nothing => None,
        }
    }
}
