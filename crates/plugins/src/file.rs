//! 파일 플러그인 -- tail 소스와 append 싱크
//!
//! [`FileSource`]는 로그 파일을 `tail -f` 방식으로 따라가며 새 라인을
//! 레코드로 내보냅니다. 파일 크기 축소(truncation)를 감지하면 오프셋을
//! 처음으로 되돌립니다.
//!
//! [`FileSink`]는 레코드를 파일에 덧붙이고, 레코드가 개행으로 끝나지
//! 않으면 개행을 붙입니다.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tokio::fs::{File, OpenOptions, metadata};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logpost_core::error::{ConfigError, LogpostError, PluginError};
use logpost_core::plugin::{Sink, Source};

/// 열기 실패 시 재시도 간격
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// 파일 소스 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSourceConfig {
    /// 감시할 파일 경로
    pub path: String,
    /// 데이터/에러 채널 용량
    pub buffer: usize,
    /// true면 파일 처음부터, false면 끝에서부터 읽기 시작
    pub start_beginning: bool,
    /// 파일 상태 체크 주기 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            buffer: 1000,
            start_beginning: false,
            poll_interval_ms: 1000,
        }
    }
}

impl FileSourceConfig {
    /// 설정값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::InvalidPlugin {
                plugin: "file".to_owned(),
                reason: "missing or invalid path for file input".to_owned(),
            });
        }
        Ok(())
    }
}

/// tail 방식 파일 소스
#[derive(Debug)]
pub struct FileSource {
    config: FileSourceConfig,
    data_tx: mpsc::Sender<Bytes>,
    data_rx: Option<mpsc::Receiver<Bytes>>,
    err_tx: mpsc::Sender<LogpostError>,
    err_rx: Option<mpsc::Receiver<LogpostError>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FileSource {
    /// 검증된 설정으로 소스를 만듭니다.
    pub fn new(config: FileSourceConfig) -> Result<Self, ConfigError> {
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

    /// 주어진 오프셋부터 새 라인을 읽습니다.
    ///
    /// 반환값: (읽은 라인들, 새 오프셋)
    async fn read_new_lines(path: &Path, offset: u64) -> std::io::Result<(Vec<Bytes>, u64)> {
        let file = File::open(path).await?;
        let mut reader = BufReader::new(file);
        reader.seek(std::io::SeekFrom::Start(offset)).await?;

        let mut lines = Vec::new();
        let mut current_offset = offset;
        let mut line_buffer = String::new();

        loop {
            line_buffer.clear();
            let bytes_read = reader.read_line(&mut line_buffer).await?;
            if bytes_read == 0 {
                break;
            }
            // 개행 없이 끝난 라인은 다음 폴링에서 이어질 수 있으므로 보류
            if !line_buffer.ends_with('\n') {
                break;
            }
            current_offset += bytes_read as u64;
            if !line_buffer.trim().is_empty() {
                lines.push(Bytes::from(line_buffer.trim_end().to_owned()));
            }
            if lines.len() >= 1000 {
                debug!("read batch limit reached, continuing next poll");
                break;
            }
        }

        Ok((lines, current_offset))
    }

    /// tail 루프. 취소될 때까지 실행됩니다.
    async fn tail(
        config: FileSourceConfig,
        data_tx: mpsc::Sender<Bytes>,
        err_tx: mpsc::Sender<LogpostError>,
        cancel: CancellationToken,
    ) {
        let path = std::path::PathBuf::from(&config.path);
        let poll_interval = Duration::from_millis(config.poll_interval_ms.max(1));

        // 시작 오프셋: 처음부터 또는 현재 파일 끝에서부터
        let mut offset = if config.start_beginning {
            0
        } else {
            match metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(_) => 0,
            }
        };

        info!(path = %config.path, offset, "file source started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(path = %config.path, "file source received stop signal");
                    break;
                }
                _ = sleep(poll_interval) => {}
            }

            // truncation 감지
            if let Ok(meta) = metadata(&path).await
                && meta.len() < offset
            {
                warn!(path = %config.path, size = meta.len(), offset, "file truncated, resetting offset");
                offset = 0;
            }

            match Self::read_new_lines(&path, offset).await {
                Ok((lines, new_offset)) => {
                    offset = new_offset;
                    for line in lines {
                        if data_tx.send(line).await.is_err() {
                            debug!(path = %config.path, "data channel closed, stopping tail");
                            return;
                        }
                    }
                }
                Err(e) => {
                    let report = PluginError::Source {
                        plugin: "file".to_owned(),
                        reason: format!("error reading file {}: {e}", config.path),
                    };
                    if err_tx.try_send(report.into()).is_err() {
                        debug!("source error channel full, dropping error");
                    }
                    sleep(RETRY_INTERVAL).await;
                }
            }
        }
    }
}

impl Source for FileSource {
    async fn start(&mut self) -> Result<(), LogpostError> {
        let config = self.config.clone();
        let data_tx = self.data_tx.clone();
        let err_tx = self.err_tx.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(Self::tail(config, data_tx, err_tx, cancel)));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogpostError> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(path = %self.config.path, "file source stopped");
        Ok(())
    }

    fn take_output(&mut self) -> Option<mpsc::Receiver<Bytes>> {
        self.data_rx.take()
    }

    fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>> {
        self.err_rx.take()
    }
}

/// 파일 싱크 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSinkConfig {
    /// 출력 파일 경로
    pub path: String,
    /// 데이터/에러 채널 용량
    pub buffer: usize,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            buffer: 1000,
        }
    }
}

impl FileSinkConfig {
    /// 설정값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::InvalidPlugin {
                plugin: "file".to_owned(),
                reason: "missing or invalid path for file output".to_owned(),
            });
        }
        Ok(())
    }
}

/// append 방식 파일 싱크
#[derive(Debug)]
pub struct FileSink {
    config: FileSinkConfig,
    data_tx: mpsc::Sender<Bytes>,
    data_rx: Option<mpsc::Receiver<Bytes>>,
    err_tx: mpsc::Sender<LogpostError>,
    err_rx: Option<mpsc::Receiver<LogpostError>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FileSink {
    /// 검증된 설정으로 싱크를 만듭니다.
    pub fn new(config: FileSinkConfig) -> Result<Self, ConfigError> {
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

    /// 쓰기 루프. 파일 열기에 실패하면 재시도합니다.
    async fn write_loop(
        config: FileSinkConfig,
        mut data_rx: mpsc::Receiver<Bytes>,
        err_tx: mpsc::Sender<LogpostError>,
        cancel: CancellationToken,
    ) {
        let mut file = loop {
            match OpenOptions::new()
                .append(true)
                .create(true)
                .open(&config.path)
                .await
            {
                Ok(f) => break f,
                Err(e) => {
                    let report = PluginError::Sink {
                        plugin: "file".to_owned(),
                        reason: format!("error opening file {} for output: {e}", config.path),
                    };
                    if err_tx.try_send(report.into()).is_err() {
                        debug!("sink error channel full, dropping error");
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = sleep(RETRY_INTERVAL) => {}
                    }
                }
            }
        };

        info!(path = %config.path, "file sink started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = data_rx.recv() => {
                    let Some(data) = maybe else { break };
                    let mut result = file.write_all(&data).await;
                    if result.is_ok() && !data.ends_with(b"\n") {
                        result = file.write_all(b"\n").await;
                    }
                    if let Err(e) = result {
                        let report = PluginError::Sink {
                            plugin: "file".to_owned(),
                            reason: format!("error writing to {}: {e}", config.path),
                        };
                        if err_tx.try_send(report.into()).is_err() {
                            debug!("sink error channel full, dropping error");
                        }
                    }
                }
            }
        }
        let _ = file.flush().await;
    }
}

impl Sink for FileSink {
    async fn start(&mut self) -> Result<(), LogpostError> {
        let data_rx = self
            .data_rx
            .take()
            .ok_or(logpost_core::error::PipelineError::AlreadyRunning)?;
        let config = self.config.clone();
        let err_tx = self.err_tx.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(Self::write_loop(
            config, data_rx, err_tx, cancel,
        )));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogpostError> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(path = %self.config.path, "file sink stopped");
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
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn source_config_requires_path() {
        let config = FileSourceConfig::default();
        assert!(config.validate().is_err());

        let ok = FileSourceConfig {
            path: "/var/log/app.log".to_owned(),
            ..Default::default()
        };
        ok.validate().unwrap();
    }

    #[test]
    fn sink_config_requires_path() {
        assert!(FileSinkConfig::default().validate().is_err());
    }

    #[tokio::test]
    async fn read_new_lines_from_offset_zero() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "line 1").unwrap();
        writeln!(temp, "line 2").unwrap();
        temp.flush().unwrap();

        let (lines, offset) = FileSource::read_new_lines(temp.path(), 0).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_ref(), b"line 1");
        assert!(offset > 0);
    }

    #[tokio::test]
    async fn partial_line_is_held_back() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "complete").unwrap();
        write!(temp, "partial").unwrap();
        temp.flush().unwrap();

        let (lines, offset) = FileSource::read_new_lines(temp.path(), 0).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_ref(), b"complete");
        // 오프셋은 완성된 라인까지만 전진한다
        assert_eq!(offset, "complete\n".len() as u64);
    }

    #[tokio::test]
    async fn source_tails_appended_lines() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "old line").unwrap();
        temp.flush().unwrap();

        let config = FileSourceConfig {
            path: temp.path().to_string_lossy().into_owned(),
            poll_interval_ms: 20,
            ..Default::default()
        };
        let mut source = FileSource::new(config).unwrap();
        let mut data_rx = source.take_output().unwrap();
        Source::start(&mut source).await.unwrap();

        // 시작 이후에 덧붙인 라인만 도착해야 한다
        writeln!(temp, "new line").unwrap();
        temp.flush().unwrap();

        let line = tokio::time::timeout(Duration::from_secs(2), data_rx.recv())
            .await
            .expect("tailed line should arrive")
            .unwrap();
        assert_eq!(line.as_ref(), b"new line");

        Source::stop(&mut source).await.unwrap();
    }

    #[tokio::test]
    async fn sink_appends_with_trailing_newline() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();

        let config = FileSinkConfig {
            path: path.to_string_lossy().into_owned(),
            ..Default::default()
        };
        let mut sink = FileSink::new(config).unwrap();
        Sink::start(&mut sink).await.unwrap();

        let destination = sink.destination();
        destination
            .send(Bytes::from_static(b"no newline"))
            .await
            .unwrap();
        destination
            .send(Bytes::from_static(b"with newline\n"))
            .await
            .unwrap();

        // 쓰기 완료를 기다린 뒤 정지
        tokio::time::sleep(Duration::from_millis(100)).await;
        Sink::stop(&mut sink).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "no newline\nwith newline\n");
    }
}
