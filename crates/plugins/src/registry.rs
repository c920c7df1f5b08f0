//! 플러그인 레지스트리 -- 구성에서 소스/싱크 생성
//!
//! `plugin` 키로 종류를 고르고, 나머지 옵션 맵을 해당 플러그인의 설정
//! 타입으로 역직렬화합니다. 알 수 없는 플러그인 id는 로드 시점
//! 에러입니다.

use serde::de::DeserializeOwned;
use serde_json::Value;

use logpost_core::config::PluginSpec;
use logpost_core::error::ConfigError;
use logpost_core::plugin::{DynSink, DynSource};

use crate::file::{FileSink, FileSinkConfig, FileSource, FileSourceConfig};
use crate::loki::{LokiSink, LokiSinkConfig};
use crate::stdout::StdoutSink;

/// 소스 플러그인을 생성합니다.
pub fn build_source(spec: &PluginSpec) -> Result<Box<dyn DynSource>, ConfigError> {
    match spec.plugin.as_str() {
        "file" => {
            let config: FileSourceConfig = from_options(spec)?;
            Ok(Box::new(FileSource::new(config)?))
        }
        "" => Err(ConfigError::UnknownPlugin("(none)".to_owned())),
        other => Err(ConfigError::UnknownPlugin(other.to_owned())),
    }
}

/// 싱크 플러그인을 생성합니다.
pub fn build_sink(spec: &PluginSpec) -> Result<Box<dyn DynSink>, ConfigError> {
    match spec.plugin.as_str() {
        "file" => {
            let config: FileSinkConfig = from_options(spec)?;
            Ok(Box::new(FileSink::new(config)?))
        }
        "stdout" => Ok(Box::new(StdoutSink::default())),
        "loki" => {
            let config: LokiSinkConfig = from_options(spec)?;
            Ok(Box::new(LokiSink::new(config)?))
        }
        "" => Err(ConfigError::UnknownPlugin("(none)".to_owned())),
        other => Err(ConfigError::UnknownPlugin(other.to_owned())),
    }
}

/// 옵션 맵을 플러그인 설정 타입으로 역직렬화합니다.
fn from_options<T: DeserializeOwned>(spec: &PluginSpec) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(spec.options.clone())).map_err(|e| {
        ConfigError::InvalidPlugin {
            plugin: spec.plugin.clone(),
            reason: e.to_string(),
        }
    })
}
