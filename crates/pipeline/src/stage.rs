//! stage -- 레코드별 동시 처리 단위
//!
//! stage는 입구 채널에서 레코드를 받아 레코드마다 자체 태스크를
//! 스폰합니다. 느린 레코드가 다음 레코드를 막지 않으며, 그 대가로
//! stage 내부의 레코드 순서는 보장되지 않습니다.
//!
//! # 생명주기
//! Fresh -> Running (`run`) -> Stopping (`stop`) -> Stopped
//! `stop`은 진행 중인 모든 레코드 태스크가 끝날 때까지 블로킹합니다.

use std::sync::Arc;

use serde_json::Map;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logpost_core::error::{LogpostError, RecordError};
use logpost_core::record::Record;

use crate::step::{Step, StepOutcome};

/// stage 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// 생성됨, 아직 시작 전
    Fresh,
    /// 실행 중
    Running,
    /// 정지 요청됨, 드레인 중
    Stopping,
    /// 모든 태스크 종료됨
    Stopped,
}

/// 레코드 처리 stage
#[derive(Debug)]
pub struct Stage {
    steps: Arc<Vec<Step>>,
    state: StageState,
    cancel: CancellationToken,
    main_task: Option<JoinHandle<()>>,
}

impl Stage {
    /// step 목록으로 stage를 만듭니다.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(steps),
            state: StageState::Fresh,
            cancel: CancellationToken::new(),
            main_task: None,
        }
    }

    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> StageState {
        self.state
    }

    /// stage를 시작합니다.
    ///
    /// 입구 채널이 닫히거나 취소될 때까지 레코드를 받아 처리합니다.
    pub fn run(
        &mut self,
        mut input: mpsc::Receiver<Record>,
        output: mpsc::Sender<Record>,
        errors: mpsc::Sender<LogpostError>,
    ) {
        let steps = Arc::clone(&self.steps);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut workers = JoinSet::new();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("stage received stop signal");
                        break;
                    }
                    maybe = input.recv() => {
                        let Some(record) = maybe else {
                            debug!("stage ingress closed");
                            break;
                        };
                        let steps = Arc::clone(&steps);
                        let output = output.clone();
                        let errors = errors.clone();
                        workers.spawn(async move {
                            process_record(&steps, record, &output, &errors).await;
                        });
                        // 끝난 태스크를 기회적으로 정리
                        while workers.try_join_next().is_some() {}
                    }
                }
            }
            // 진행 중인 레코드 태스크 드레인
            while workers.join_next().await.is_some() {}
        });

        self.main_task = Some(handle);
        self.state = StageState::Running;
        info!("stage started");
    }

    /// stage를 정지합니다.
    ///
    /// 새 레코드 수신을 즉시 중단하고, 진행 중인 레코드 태스크가
    /// 전부 반환될 때까지 기다립니다.
    pub async fn stop(&mut self) {
        if self.state != StageState::Running {
            return;
        }
        self.state = StageState::Stopping;
        self.cancel.cancel();
        if let Some(handle) = self.main_task.take() {
            if handle.await.is_err() {
                warn!("stage main task aborted unexpectedly");
            }
        }
        self.state = StageState::Stopped;
        info!("stage stopped");
    }
}

/// 레코드 하나를 step 파이프라인에 통과시킵니다.
async fn process_record(
    steps: &[Step],
    mut record: Record,
    output: &mpsc::Sender<Record>,
    errors: &mpsc::Sender<LogpostError>,
) {
    if record.payload().is_empty() {
        forward_error(errors, RecordError::EmptyData.into());
        return;
    }

    // fields는 stage 범위의 작업 공간이다. tags/vars는 레코드와 함께
    // 파이프라인 전체를 여행한다.
    record.fields().replace(Map::new());

    for step in steps {
        match step.run(&mut record) {
            StepOutcome::Continue => {}
            StepOutcome::Removed => {
                debug!("record removed, discarding");
                return;
            }
            StepOutcome::Failed(err) => {
                debug!(error = %err, "record failed, discarding");
                forward_error(errors, err.into());
                return;
            }
        }
    }

    if output.send(record).await.is_err() {
        debug!("stage egress closed, dropping record");
    }
}

/// 에러 채널로 비블로킹 전송합니다. 가득 차 있으면 버립니다.
fn forward_error(errors: &mpsc::Sender<LogpostError>, err: LogpostError) {
    if let Err(e) = errors.try_send(err) {
        warn!(error = %e, "error channel full, dropping error");
    }
}
