//! 런타임 배선 -- 소스/싱크 플러그인과 파이프라인 연결
//!
//! [`RunningPipeline`]은 소스의 출력 채널을 파이프라인 입구로,
//! 파이프라인 출구를 모든 싱크의 목적지 채널로 잇고, 소스/싱크/레코드
//! 에러를 공유 에러 채널로 전달합니다.
//!
//! # 정지 순서
//! 소스 -> 파이프라인(드레인) -> 싱크. 소스를 먼저 멈춰 새 유입을
//! 끊고, 파이프라인이 진행 중인 레코드를 마저 처리한 뒤 싱크를 멈춥니다.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use logpost_core::error::{LogpostError, PipelineError};
use logpost_core::plugin::{DynSink, DynSource};

use crate::pipeline::{Pipeline, ingest};
use crate::stage::Stage;

/// 소스/싱크/stage가 모두 연결된 실행 단위
#[derive(Debug)]
pub struct RunningPipeline {
    name: String,
    sources: Vec<Box<dyn DynSource>>,
    sinks: Vec<Box<dyn DynSink>>,
    pipeline: Pipeline,
    cancel: CancellationToken,
    forwarders: Vec<JoinHandle<()>>,
}

impl RunningPipeline {
    /// 구성 요소를 조립합니다. 아직 아무 것도 시작하지 않습니다.
    pub fn new(
        name: impl Into<String>,
        sources: Vec<Box<dyn DynSource>>,
        sinks: Vec<Box<dyn DynSink>>,
        stages: Vec<Stage>,
    ) -> Self {
        let mut pipeline = Pipeline::new();
        pipeline.add_stages(stages);
        Self {
            name: name.into(),
            sources,
            sinks,
            pipeline,
            cancel: CancellationToken::new(),
            forwarders: Vec::new(),
        }
    }

    /// 파이프라인 이름을 반환합니다.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 모든 구성 요소를 시작하고 배선합니다.
    pub async fn run(
        &mut self,
        shared_errors: mpsc::Sender<LogpostError>,
    ) -> Result<(), LogpostError> {
        info!(
            pipeline = %self.name,
            sources = self.sources.len(),
            sinks = self.sinks.len(),
            "pipeline starting"
        );

        for source in &mut self.sources {
            source.start().await?;
        }
        for sink in &mut self.sinks {
            sink.start().await?;
        }

        // 소스 -> 파이프라인 입구
        let in_tx = self.pipeline.sender();
        for source in &mut self.sources {
            if let Some(mut data_rx) = source.take_output() {
                let in_tx = in_tx.clone();
                let cancel = self.cancel.clone();
                self.forwarders.push(tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            maybe = data_rx.recv() => {
                                let Some(data) = maybe else { break };
                                if ingest(&in_tx, data).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    debug!("ingress forwarder stopped");
                }));
            }
            if let Some(err_rx) = source.take_errors() {
                self.forwarders.push(spawn_error_forwarder(
                    err_rx,
                    shared_errors.clone(),
                    self.cancel.clone(),
                ));
            }
        }

        // 파이프라인 출구 -> 모든 싱크
        let mut out_rx = self
            .pipeline
            .take_output()
            .ok_or(PipelineError::AlreadyRunning)?;
        let destinations: Vec<mpsc::Sender<Bytes>> =
            self.sinks.iter().map(|sink| sink.destination()).collect();
        // 정지 중에도 계속 소비한다. stage 드레인이 출구 채널에 막히지
        // 않아야 하고, 싱크는 파이프라인보다 늦게 정지한다.
        self.forwarders.push(tokio::spawn(async move {
            while let Some(record) = out_rx.recv().await {
                let data = record.payload().clone();
                for destination in &destinations {
                    if destination.send(data.clone()).await.is_err() {
                        debug!("sink destination closed, skipping");
                    }
                }
            }
            debug!("egress forwarder stopped");
        }));

        // 레코드 에러 -> 공유 에러 채널
        let pipeline_errors = self
            .pipeline
            .take_errors()
            .ok_or(PipelineError::AlreadyRunning)?;
        self.forwarders.push(spawn_error_forwarder(
            pipeline_errors,
            shared_errors.clone(),
            self.cancel.clone(),
        ));

        // 싱크 에러 -> 공유 에러 채널
        for sink in &mut self.sinks {
            if let Some(err_rx) = sink.take_errors() {
                self.forwarders.push(spawn_error_forwarder(
                    err_rx,
                    shared_errors.clone(),
                    self.cancel.clone(),
                ));
            }
        }

        self.pipeline.run()?;
        info!(pipeline = %self.name, "pipeline started");
        Ok(())
    }

    /// 모든 구성 요소를 정지합니다.
    pub async fn stop(&mut self) {
        info!(pipeline = %self.name, "pipeline stopping");
        self.cancel.cancel();

        for source in &mut self.sources {
            if let Err(e) = source.stop().await {
                error!(pipeline = %self.name, error = %e, "failed to stop source");
            }
        }

        self.pipeline.stop().await;

        for sink in &mut self.sinks {
            if let Err(e) = sink.stop().await {
                error!(pipeline = %self.name, error = %e, "failed to stop sink");
            }
        }

        for task in self.forwarders.drain(..) {
            task.abort();
            let _ = task.await;
        }
        info!(pipeline = %self.name, "pipeline stopped");
    }
}

/// 에러 채널을 공유 채널로 잇는 태스크를 스폰합니다.
///
/// 공유 채널이 가득 차 있으면 에러를 버립니다 (비블로킹 전송).
fn spawn_error_forwarder(
    mut from: mpsc::Receiver<LogpostError>,
    to: mpsc::Sender<LogpostError>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = from.recv() => {
                    let Some(err) = maybe else { break };
                    if to.try_send(err).is_err() {
                        debug!("shared error channel full, dropping error");
                    }
                }
            }
        }
        debug!("error forwarder stopped");
    })
}
