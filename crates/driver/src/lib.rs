#![doc = include_str!("../README.md")]

pub mod action;
pub mod expr;
pub mod extract;
pub mod json;
pub mod path;
pub mod predicate;
pub mod registry;

use logpost_core::record::Record;

/// 데이터 처리기 trait
///
/// 드라이버는 설정 로드 시점에 컴파일된 변형 단위입니다. 레코드에
/// 대한 에러는 레코드 자체에 기록되며, 호출자가 `record.error()`로
/// 확인합니다.
pub trait Driver: Send + Sync + std::fmt::Debug {
    /// 레코드를 드라이버에 통과시킵니다.
    fn process(&self, record: &mut Record);
}

// --- 주요 타입 re-export ---

// 드라이버
pub use json::{JsonDriver, TAGS_KEY};

// 구성 -> 드라이버
pub use registry::from_workflow;

// 빌딩 블록
pub use action::{Action, CompiledAction};
pub use expr::{Getter, parse_function};
pub use extract::{Extractor, Method};
pub use path::parse_levels;
pub use predicate::Predicate;
