//! pipeline set -- 독립 파이프라인들의 공통 생명주기
//!
//! 여러 파이프라인을 한 번에 시작/정지하고, 파이프라인 수에 비례해
//! 크기가 정해지는 공유 에러 채널을 소유합니다.

use tokio::sync::mpsc;
use tracing::info;

use logpost_core::error::LogpostError;

use crate::runtime::RunningPipeline;

/// 파이프라인당 공유 에러 채널 용량
const ERRORS_PER_PIPELINE: usize = 1000;

/// 파이프라인 모음
#[derive(Default, Debug)]
pub struct PipelineSet {
    pipelines: Vec<RunningPipeline>,
    err_rx: Option<mpsc::Receiver<LogpostError>>,
}

impl PipelineSet {
    /// 빈 세트를 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파이프라인을 추가합니다.
    pub fn add_pipeline(&mut self, pipeline: RunningPipeline) {
        self.pipelines.push(pipeline);
    }

    /// 등록된 파이프라인 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// 파이프라인이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// 모든 파이프라인을 시작합니다.
    ///
    /// 공유 에러 채널은 `파이프라인 수 x 1000` 크기로 생성됩니다.
    pub async fn run(&mut self) -> Result<(), LogpostError> {
        info!(pipelines = self.pipelines.len(), "starting pipeline collection");
        let capacity = self.pipelines.len().max(1) * ERRORS_PER_PIPELINE;
        let (err_tx, err_rx) = mpsc::channel(capacity);
        self.err_rx = Some(err_rx);

        for pipeline in &mut self.pipelines {
            info!(pipeline = %pipeline.name(), "starting pipeline");
            pipeline.run(err_tx.clone()).await?;
        }
        Ok(())
    }

    /// 공유 에러 수신 채널을 넘겨줍니다. 최초 한 번만 Some.
    pub fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>> {
        self.err_rx.take()
    }

    /// 모든 파이프라인을 정지합니다.
    pub async fn stop(&mut self) {
        info!(pipelines = self.pipelines.len(), "stopping pipeline collection");
        for pipeline in &mut self.pipelines {
            info!(pipeline = %pipeline.name(), "stopping pipeline");
            pipeline.stop().await;
        }
    }
}
