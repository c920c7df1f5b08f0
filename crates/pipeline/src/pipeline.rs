//! pipeline -- 입구에서 출구까지 stage를 잇는 데이터 경로
//!
//! `run()`은 `ingress -> stage_1 -> ... -> stage_n -> egress`를 배선하고
//! 모든 stage를 시작합니다. `stop()`은 stage를 선언 순서대로 정지하며,
//! 모든 stage가 Stopped가 되기 전에는 아무 채널도 닫지 않습니다.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use logpost_core::error::{LogpostError, PipelineError};
use logpost_core::record::Record;

use crate::DEFAULT_CHANNEL_CAPACITY;
use crate::stage::Stage;

/// stage들을 잇는 단일 데이터 경로
#[derive(Debug)]
pub struct Pipeline {
    in_tx: mpsc::Sender<Record>,
    in_rx: Option<mpsc::Receiver<Record>>,
    out_tx: mpsc::Sender<Record>,
    out_rx: Option<mpsc::Receiver<Record>>,
    err_tx: mpsc::Sender<LogpostError>,
    err_rx: Option<mpsc::Receiver<LogpostError>>,
    stages: Vec<Stage>,
    passthrough: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// 빈 파이프라인을 만듭니다.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// 채널 용량을 지정해 파이프라인을 만듭니다.
    pub fn with_capacity(capacity: usize) -> Self {
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (err_tx, err_rx) = mpsc::channel(capacity);
        Self {
            in_tx,
            in_rx: Some(in_rx),
            out_tx,
            out_rx: Some(out_rx),
            err_tx,
            err_rx: Some(err_rx),
            stages: Vec::new(),
            passthrough: None,
        }
    }

    /// stage를 추가합니다. 추가 순서가 실행 순서입니다.
    pub fn add_stages(&mut self, stages: Vec<Stage>) {
        self.stages.extend(stages);
    }

    /// 입구 송신 채널을 반환합니다.
    pub fn sender(&self) -> mpsc::Sender<Record> {
        self.in_tx.clone()
    }

    /// 출구 수신 채널을 넘겨줍니다. 최초 한 번만 Some.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<Record>> {
        self.out_rx.take()
    }

    /// 에러 수신 채널을 넘겨줍니다. 최초 한 번만 Some.
    pub fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>> {
        self.err_rx.take()
    }

    /// stage 수를 반환합니다.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// 배선을 완성하고 모든 stage를 시작합니다.
    pub fn run(&mut self) -> Result<(), PipelineError> {
        let mut inbound = self
            .in_rx
            .take()
            .ok_or(PipelineError::AlreadyRunning)?;

        if self.stages.is_empty() {
            // stage가 없으면 입구를 출구로 직결
            let out_tx = self.out_tx.clone();
            self.passthrough = Some(tokio::spawn(async move {
                while let Some(record) = inbound.recv().await {
                    if out_tx.send(record).await.is_err() {
                        break;
                    }
                }
                debug!("passthrough pipeline ingress closed");
            }));
            info!("pipeline started with no stages");
            return Ok(());
        }

        let last = self.stages.len() - 1;
        for (i, stage) in self.stages.iter_mut().enumerate() {
            if i == last {
                stage.run(inbound, self.out_tx.clone(), self.err_tx.clone());
                break;
            }
            let (link_tx, link_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
            stage.run(inbound, link_tx, self.err_tx.clone());
            inbound = link_rx;
        }

        info!(stages = self.stages.len(), "pipeline started");
        Ok(())
    }

    /// 모든 stage를 순서대로 정지합니다.
    ///
    /// 각 stage의 정지는 진행 중인 레코드 태스크의 완료를 기다립니다.
    pub async fn stop(&mut self) {
        for stage in &mut self.stages {
            stage.stop().await;
        }
        if let Some(task) = self.passthrough.take() {
            task.abort();
            let _ = task.await;
        }
        info!("pipeline stopped");
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// 바이트를 레코드로 감싸 입구로 보냅니다.
pub(crate) async fn ingest(sender: &mpsc::Sender<Record>, data: Bytes) -> Result<(), PipelineError> {
    sender
        .send(Record::new(data))
        .await
        .map_err(|e| PipelineError::ChannelSend(e.to_string()))
}
