//! 표현식 문법 -- `ident(arg)` 파싱과 사이드 채널 getter
//!
//! action/condition/driverActions 값은 모두 같은 문법을 공유합니다:
//! 식별자 뒤에 괄호로 묶인 인자. 인자 없는 bare 식별자는
//! `drop`, `keep`, `remove`, `exists` 네 개만 허용됩니다.
//!
//! 파싱은 설정 로드 시점에만 일어납니다. 런타임 경로는 컴파일된
//! [`Getter`]만 사용합니다.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use logpost_core::record::Record;

static FUNC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z]+)\((.*)\)$").expect("function grammar regex"));

/// 인자 없이 쓸 수 있는 bare 식별자 목록
const BARE_IDENTS: [&str; 4] = ["drop", "keep", "remove", "exists"];

/// `ident(arg)` 표현식을 (이름, 인자)로 파싱합니다.
///
/// 문법에 맞지 않으면 None을 반환합니다.
pub fn parse_function(input: &str) -> Option<(&str, &str)> {
    if BARE_IDENTS.contains(&input) {
        return Some((input, ""));
    }
    let caps = FUNC_RE.captures(input)?;
    // 캡처 그룹 둘은 정규식 구조상 항상 존재한다
    let name = caps.get(1)?.as_str();
    let arg = caps.get(2)?.as_str();
    Some((name, arg))
}

/// 사이드 채널 참조 -- `getVar(k)` 또는 `getTag(k)`
///
/// 설정 로드 시점에 컴파일되어 레코드 처리 중에는 문자열 파싱 없이
/// 조회만 수행합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Getter {
    /// vars 사이드 채널 참조
    Var(String),
    /// tags 사이드 채널 참조
    Tag(String),
}

impl Getter {
    /// `getVar(k)` / `getTag(k)` 형태의 문자열을 파싱합니다.
    ///
    /// 그 외 형태(빈 인자 포함)는 None.
    pub fn parse(input: &str) -> Option<Self> {
        let (name, arg) = parse_function(input)?;
        if arg.is_empty() {
            return None;
        }
        match name {
            "getVar" => Some(Self::Var(arg.to_owned())),
            "getTag" => Some(Self::Tag(arg.to_owned())),
            _ => None,
        }
    }

    /// 레코드의 해당 사이드 채널에서 값을 조회합니다.
    pub fn fetch(&self, record: &Record) -> Option<Value> {
        match self {
            Self::Var(key) => record.vars().get(key),
            Self::Tag(key) => record.tags().get(key).map(Value::String),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    #[test]
    fn parses_name_and_argument() {
        assert_eq!(parse_function("addField(msg)"), Some(("addField", "msg")));
        assert_eq!(parse_function("matchString(a,b)"), Some(("matchString", "a,b")));
        assert_eq!(parse_function("keep()"), Some(("keep", "")));
    }

    #[test]
    fn bare_identifiers_are_legal() {
        for ident in ["drop", "keep", "remove", "exists"] {
            assert_eq!(parse_function(ident), Some((ident, "")));
        }
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!(parse_function("addField"), None);
        assert_eq!(parse_function("addField("), None);
        assert_eq!(parse_function("(arg)"), None);
        assert_eq!(parse_function(""), None);
        assert_eq!(parse_function("add Field(x)"), None);
    }

    #[test]
    fn getter_parses_only_known_forms() {
        assert_eq!(Getter::parse("getVar(v1)"), Some(Getter::Var("v1".to_owned())));
        assert_eq!(Getter::parse("getTag(env)"), Some(Getter::Tag("env".to_owned())));
        assert_eq!(Getter::parse("getVar()"), None);
        assert_eq!(Getter::parse("getOther(x)"), None);
        assert_eq!(Getter::parse("plain"), None);
    }

    #[test]
    fn getter_fetches_from_side_channels() {
        let record = Record::new(Bytes::from_static(b"{}"));
        record.vars().add("v1", json!(42));
        record.tags().add("env", "prod");

        assert_eq!(
            Getter::Var("v1".to_owned()).fetch(&record),
            Some(json!(42))
        );
        assert_eq!(
            Getter::Tag("env".to_owned()).fetch(&record),
            Some(json!("prod"))
        );
        assert_eq!(Getter::Var("missing".to_owned()).fetch(&record), None);
    }
}
