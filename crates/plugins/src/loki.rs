//! Loki 싱크 -- 원격 로그 수집 HTTP 엔드포인트로 전송
//!
//! 이 싱크는 파이프라인이 내보낸 바이트를 아래 형태의 엔트리로
//! 해석합니다:
//!
//! ```json
//! { "entry": "...", "timestamp": "<RFC3339>", "tags": { "k": "v" } }
//! ```
//!
//! timestamp가 없으면 현재 시각이 쓰입니다. tags가 없거나 비어 있으면
//! 해당 엔트리는 에러 채널로 보고되고 버려집니다. 엔트리는 태그
//! 집합별로 묶여 Loki push API(`/loki/api/v1/push`)로 배치 전송됩니다.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logpost_core::error::{ConfigError, LogpostError, PipelineError, PluginError};
use logpost_core::plugin::Sink;

/// Loki 싱크 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LokiSinkConfig {
    /// Loki 베이스 URL (예: <http://localhost:3100>)
    pub url: String,
    /// 배치 최대 크기 (바이트)
    pub batch_size: usize,
    /// 배치 대기 시간 (초)
    pub batch_wait_secs: u64,
    /// 전송 실패 시 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 최소 백오프 (초)
    pub min_backoff_secs: u64,
    /// 재시도 최대 백오프 (초)
    pub max_backoff_secs: u64,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 데이터/에러 채널 용량
    pub buffer: usize,
}

impl Default for LokiSinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            batch_size: 100 * 2048,
            batch_wait_secs: 5,
            max_retries: 3,
            min_backoff_secs: 5,
            max_backoff_secs: 60,
            timeout_secs: 5,
            buffer: 1000,
        }
    }
}

impl LokiSinkConfig {
    /// 설정값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidPlugin {
                plugin: "loki".to_owned(),
                reason: "missing url for loki output".to_owned(),
            });
        }
        if reqwest::Url::parse(&self.url).is_err() {
            return Err(ConfigError::InvalidPlugin {
                plugin: "loki".to_owned(),
                reason: format!("invalid loki url: {}", self.url),
            });
        }
        Ok(())
    }

    /// push API 엔드포인트 URL을 반환합니다.
    fn push_url(&self) -> String {
        format!("{}/loki/api/v1/push", self.url.trim_end_matches('/'))
    }
}

/// 싱크가 받아들이는 엔트리 형식
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LokiEntry {
    /// 로그 본문
    pub entry: String,
    /// 발생 시각. 없으면 수신 시각으로 대체.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// 스트림 라벨. 비어 있으면 에러.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl LokiEntry {
    /// 바이트를 엔트리로 해석하고 검증합니다.
    fn decode(data: &[u8]) -> Result<Self, PluginError> {
        let entry: Self = serde_json::from_slice(data).map_err(|e| PluginError::Sink {
            plugin: "loki".to_owned(),
            reason: format!("invalid entry received by loki output: {e}"),
        })?;
        if entry.tags.is_empty() {
            return Err(PluginError::Sink {
                plugin: "loki".to_owned(),
                reason: "invalid entry received by loki output: no tags defined".to_owned(),
            });
        }
        Ok(entry)
    }
}

/// push API 요청 본문
#[derive(Debug, Serialize)]
struct PushRequest {
    streams: Vec<PushStream>,
}

#[derive(Debug, Serialize)]
struct PushStream {
    stream: BTreeMap<String, String>,
    values: Vec<[String; 2]>,
}

/// 태그 집합별로 엔트리를 묶어 push 요청을 만듭니다.
fn build_request(entries: Vec<LokiEntry>) -> PushRequest {
    let mut streams: BTreeMap<BTreeMap<String, String>, Vec<[String; 2]>> = BTreeMap::new();
    for entry in entries {
        let ts = entry.timestamp.unwrap_or_else(Utc::now);
        let nanos = ts.timestamp_nanos_opt().unwrap_or(0);
        streams
            .entry(entry.tags)
            .or_default()
            .push([nanos.to_string(), entry.entry]);
    }
    PushRequest {
        streams: streams
            .into_iter()
            .map(|(stream, values)| PushStream { stream, values })
            .collect(),
    }
}

/// Loki push 싱크
#[derive(Debug)]
pub struct LokiSink {
    config: LokiSinkConfig,
    data_tx: mpsc::Sender<Bytes>,
    data_rx: Option<mpsc::Receiver<Bytes>>,
    err_tx: mpsc::Sender<LogpostError>,
    err_rx: Option<mpsc::Receiver<LogpostError>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LokiSink {
    /// 검증된 설정으로 싱크를 만듭니다.
    pub fn new(config: LokiSinkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (data_tx, data_rx) = mpsc::channel(config.buffer.max(1));
        let (err_tx, err_rx) = mpsc::channel(config.buffer.max(1));
        Ok(Self {
            config,
            data_tx,
            data_rx: Some(data_rx),
            err_tx,
            err_rx: Some(err_rx),
            cancel: CancellationToken::new(),
            task: None,
        })
    }

    /// 수신 -> 배치 -> 전송 루프
    async fn push_loop(
        config: LokiSinkConfig,
        client: reqwest::Client,
        mut data_rx: mpsc::Receiver<Bytes>,
        err_tx: mpsc::Sender<LogpostError>,
        cancel: CancellationToken,
    ) {
        let push_url = config.push_url();
        let mut pending: Vec<LokiEntry> = Vec::new();
        let mut pending_bytes = 0usize;
        let mut flush_timer = interval(Duration::from_secs(config.batch_wait_secs.max(1)));
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = flush_timer.tick() => {
                    if !pending.is_empty() {
                        let batch = std::mem::take(&mut pending);
                        pending_bytes = 0;
                        Self::push_batch(&config, &client, &push_url, batch, &err_tx).await;
                    }
                }
                maybe = data_rx.recv() => {
                    let Some(data) = maybe else { break };
                    match LokiEntry::decode(&data) {
                        Ok(entry) => {
                            pending_bytes += entry.entry.len();
                            pending.push(entry);
                            if pending_bytes >= config.batch_size {
                                let batch = std::mem::take(&mut pending);
                                pending_bytes = 0;
                                Self::push_batch(&config, &client, &push_url, batch, &err_tx).await;
                            }
                        }
                        Err(e) => {
                            if err_tx.try_send(e.into()).is_err() {
                                debug!("sink error channel full, dropping error");
                            }
                        }
                    }
                }
            }
        }

        // 종료 전 남은 배치 플러시
        if !pending.is_empty() {
            Self::push_batch(&config, &client, &push_url, pending, &err_tx).await;
        }
    }

    /// 배치 하나를 재시도/백오프와 함께 전송합니다.
    async fn push_batch(
        config: &LokiSinkConfig,
        client: &reqwest::Client,
        push_url: &str,
        entries: Vec<LokiEntry>,
        err_tx: &mpsc::Sender<LogpostError>,
    ) {
        let count = entries.len();
        let request = build_request(entries);
        let mut backoff = Duration::from_secs(config.min_backoff_secs.max(1));
        let max_backoff = Duration::from_secs(config.max_backoff_secs.max(1));

        for attempt in 0..=config.max_retries {
            let result = client.post(push_url).json(&request).send().await;
            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(entries = count, "loki batch pushed");
                    return;
                }
                Ok(response) => {
                    warn!(status = %response.status(), attempt, "loki push rejected");
                }
                Err(e) => {
                    warn!(error = %e, attempt, "loki push failed");
                }
            }
            if attempt < config.max_retries {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
            }
        }

        let report = PluginError::Sink {
            plugin: "loki".to_owned(),
            reason: format!("error sending to loki: {count} entries dropped after retries"),
        };
        if err_tx.try_send(report.into()).is_err() {
            debug!("sink error channel full, dropping error");
        }
    }
}

impl Sink for LokiSink {
    async fn start(&mut self) -> Result<(), LogpostError> {
        let data_rx = self.data_rx.take().ok_or(PipelineError::AlreadyRunning)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs.max(1)))
            .build()
            .map_err(|e| PluginError::Sink {
                plugin: "loki".to_owned(),
                reason: format!("could not create loki client: {e}"),
            })?;

        let config = self.config.clone();
        let err_tx = self.err_tx.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(Self::push_loop(
            config, client, data_rx, err_tx, cancel,
        )));
        info!(url = %self.config.url, "loki sink started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogpostError> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(url = %self.config.url, "loki sink stopped");
        Ok(())
    }

    fn destination(&self) -> mpsc::Sender<Bytes> {
        self.data_tx.clone()
    }

    fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>> {
        self.err_rx.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_valid_url() {
        assert!(LokiSinkConfig::default().validate().is_err());

        let bad = LokiSinkConfig {
            url: "not a url".to_owned(),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let ok = LokiSinkConfig {
            url: "http://localhost:3100".to_owned(),
            ..Default::default()
        };
        ok.validate().unwrap();
    }

    #[test]
    fn push_url_joins_cleanly() {
        let config = LokiSinkConfig {
            url: "http://localhost:3100/".to_owned(),
            ..Default::default()
        };
        assert_eq!(config.push_url(), "http://localhost:3100/loki/api/v1/push");
    }

    #[test]
    fn entry_without_tags_is_rejected() {
        let err = LokiEntry::decode(br#"{"entry":"hello"}"#).unwrap_err();
        assert!(err.to_string().contains("no tags defined"));

        let err = LokiEntry::decode(br#"{"entry":"hello","tags":{}}"#).unwrap_err();
        assert!(err.to_string().contains("no tags defined"));
    }

    #[test]
    fn entry_with_invalid_json_is_rejected() {
        let err = LokiEntry::decode(b"not json").unwrap_err();
        assert!(err.to_string().contains("invalid entry"));
    }

    #[test]
    fn entry_timestamp_is_optional() {
        let entry =
            LokiEntry::decode(br#"{"entry":"hello","tags":{"env":"prod"}}"#).unwrap();
        assert!(entry.timestamp.is_none());

        let entry = LokiEntry::decode(
            br#"{"entry":"hello","timestamp":"2024-01-15T12:00:00Z","tags":{"env":"prod"}}"#,
        )
        .unwrap();
        assert!(entry.timestamp.is_some());
    }

    #[test]
    fn build_request_groups_by_tag_set() {
        let entries = vec![
            LokiEntry {
                entry: "a".to_owned(),
                timestamp: Some(Utc::now()),
                tags: BTreeMap::from([("env".to_owned(), "prod".to_owned())]),
            },
            LokiEntry {
                entry: "b".to_owned(),
                timestamp: Some(Utc::now()),
                tags: BTreeMap::from([("env".to_owned(), "prod".to_owned())]),
            },
            LokiEntry {
                entry: "c".to_owned(),
                timestamp: Some(Utc::now()),
                tags: BTreeMap::from([("env".to_owned(), "dev".to_owned())]),
            },
        ];
        let request = build_request(entries);
        assert_eq!(request.streams.len(), 2);
        let total: usize = request.streams.iter().map(|s| s.values.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let before = Utc::now().timestamp_nanos_opt().unwrap();
        let request = build_request(vec![LokiEntry {
            entry: "x".to_owned(),
            timestamp: None,
            tags: BTreeMap::from([("k".to_owned(), "v".to_owned())]),
        }]);
        let nanos: i64 = request.streams[0].values[0][0].parse().unwrap();
        assert!(nanos >= before);
    }
}
