#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod plugin;
pub mod record;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, LogpostError, PipelineError, PluginError, RecordError};

// 설정
pub use config::{
    DriverActionsSpec, FieldActionSpec, PipelineSpec, Pipelines, PluginSpec, StageSpec, StepSpec,
    WorkflowSpec,
};

// 레코드
pub use record::{KvStore, Record, TagStore};

// 플러그인 trait
pub use plugin::{BoxFuture, DynSink, DynSource, Sink, Source};
