//! 표준 출력 싱크

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use logpost_core::error::{LogpostError, PipelineError, PluginError};
use logpost_core::plugin::Sink;

/// 레코드를 한 줄씩 표준 출력에 쓰는 싱크
#[derive(Debug)]
pub struct StdoutSink {
    data_tx: mpsc::Sender<Bytes>,
    data_rx: Option<mpsc::Receiver<Bytes>>,
    err_tx: mpsc::Sender<LogpostError>,
    err_rx: Option<mpsc::Receiver<LogpostError>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StdoutSink {
    /// 새 싱크를 만듭니다.
    pub fn new(buffer: usize) -> Self {
        let (data_tx, data_rx) = mpsc::channel(buffer.max(1));
        let (err_tx, err_rx) = mpsc::channel(buffer.max(1));
        Self {
            data_tx,
            data_rx: Some(data_rx),
            err_tx,
            err_rx: Some(err_rx),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    async fn write_loop(
        mut data_rx: mpsc::Receiver<Bytes>,
        err_tx: mpsc::Sender<LogpostError>,
        cancel: CancellationToken,
    ) {
        let mut stdout = tokio::io::stdout();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = data_rx.recv() => {
                    let Some(data) = maybe else { break };
                    let mut result = stdout.write_all(&data).await;
                    if result.is_ok() && !data.ends_with(b"\n") {
                        result = stdout.write_all(b"\n").await;
                    }
                    if result.is_ok() {
                        result = stdout.flush().await;
                    }
                    if let Err(e) = result {
                        let report = PluginError::Sink {
                            plugin: "stdout".to_owned(),
                            reason: format!("error writing to stdout: {e}"),
                        };
                        if err_tx.try_send(report.into()).is_err() {
                            debug!("sink error channel full, dropping error");
                        }
                    }
                }
            }
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Sink for StdoutSink {
    async fn start(&mut self) -> Result<(), LogpostError> {
        let data_rx = self.data_rx.take().ok_or(PipelineError::AlreadyRunning)?;
        let err_tx = self.err_tx.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(Self::write_loop(data_rx, err_tx, cancel)));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogpostError> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("stdout sink stopped");
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

    #[tokio::test]
    async fn lifecycle_and_channels() {
        let mut sink = StdoutSink::default();
        assert!(sink.take_errors().is_some());
        assert!(sink.take_errors().is_none());

        Sink::start(&mut sink).await.unwrap();
        sink.destination()
            .send(Bytes::from_static(b"hello stdout"))
            .await
            .unwrap();
        Sink::stop(&mut sink).await.unwrap();
    }

    #[tokio::test]
    async fn double_start_fails() {
        let mut sink = StdoutSink::default();
        Sink::start(&mut sink).await.unwrap();
        assert!(Sink::start(&mut sink).await.is_err());
        Sink::stop(&mut sink).await.unwrap();
    }
}
