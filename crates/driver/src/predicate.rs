//! 조건 술어 -- 값에 대한 순수 불리언 검사
//!
//! 세 종류의 술어가 있고, 모두 설정 로드 시점에 한 번 컴파일됩니다.
//! 정규식 컴파일 실패는 에러가 아니라 영구 false 술어가 됩니다.

use regex::Regex;
use serde_json::Value;

/// 컴파일된 조건 술어
#[derive(Debug, Clone)]
pub enum Predicate {
    /// 문자열 완전 일치
    MatchString(String),
    /// 부분 문자열 포함
    ContainsString(String),
    /// 정규식 매칭. 컴파일에 실패하면 None으로 남아 항상 false.
    MatchRegex(Option<Regex>),
}

impl Predicate {
    /// 조건 이름과 인자로 술어를 컴파일합니다.
    ///
    /// 알 수 없는 이름이면 None.
    pub fn compile(name: &str, arg: &str) -> Option<Self> {
        match name {
            "matchString" => Some(Self::MatchString(arg.to_owned())),
            "containsString" => Some(Self::ContainsString(arg.to_owned())),
            "matchRegex" => Some(Self::MatchRegex(Regex::new(arg).ok())),
            _ => None,
        }
    }

    /// 값에 대해 술어를 평가합니다.
    pub fn eval(&self, value: &Value) -> bool {
        match self {
            Self::MatchString(expected) => value.as_str() == Some(expected.as_str()),
            Self::ContainsString(needle) => {
                value.as_str().is_some_and(|s| s.contains(needle.as_str()))
            }
            Self::MatchRegex(Some(regex)) => regex.is_match(&render(value)),
            Self::MatchRegex(None) => false,
        }
    }
}

/// 술어 목록을 단락 평가합니다.
///
/// 목록이 비어 있으면 무조건 true (action은 항상 발화).
pub fn any_match(predicates: &[Predicate], value: &Value) -> bool {
    predicates.is_empty() || predicates.iter().any(|p| p.eval(value))
}

/// 값의 기본 문자열 렌더링
///
/// 문자열은 내용 그대로, 그 외에는 간결한 JSON 표기를 사용합니다.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn match_string_requires_string_equality() {
        let pred = Predicate::compile("matchString", "hello").unwrap();
        assert!(pred.eval(&json!("hello")));
        assert!(!pred.eval(&json!("hello world")));
        // 문자열이 아닌 값은 항상 false
        assert!(!pred.eval(&json!(5)));
        assert!(!pred.eval(&Value::Null));
    }

    #[test]
    fn contains_string_matches_substring() {
        let pred = Predicate::compile("containsString", "ell").unwrap();
        assert!(pred.eval(&json!("hello")));
        assert!(!pred.eval(&json!("world")));
        assert!(!pred.eval(&json!(true)));
    }

    #[test]
    fn match_regex_uses_string_rendering() {
        let pred = Predicate::compile("matchRegex", "^[0-9]+$").unwrap();
        assert!(pred.eval(&json!("12345")));
        // 숫자 값도 렌더링을 거쳐 매칭된다
        assert!(pred.eval(&json!(42)));
        assert!(!pred.eval(&json!("12a")));
    }

    #[test]
    fn invalid_regex_is_permanently_false() {
        let pred = Predicate::compile("matchRegex", "[unclosed").unwrap();
        assert!(!pred.eval(&json!("anything")));
        assert!(!pred.eval(&json!("[unclosed")));
    }

    #[test]
    fn unknown_predicate_name_rejected() {
        assert!(Predicate::compile("startsWith", "x").is_none());
    }

    #[test]
    fn empty_predicate_list_always_fires() {
        assert!(any_match(&[], &json!("anything")));
    }

    #[test]
    fn any_match_short_circuits_on_first_hit() {
        let preds = vec![
            Predicate::compile("matchString", "nope").unwrap(),
            Predicate::compile("containsString", "ye").unwrap(),
        ];
        assert!(any_match(&preds, &json!("yes")));
        assert!(!any_match(&preds, &json!("no")));
    }

    #[test]
    fn render_keeps_strings_and_serializes_rest() {
        assert_eq!(render(&json!("raw")), "raw");
        assert_eq!(render(&json!(3.5)), "3.5");
        assert_eq!(render(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(render(&Value::Null), "null");
    }
}
