//! 에러 타입 — 도메인별 에러 정의

/// Logpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 레코드 처리 에러
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// 플러그인 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 드라이버/플러그인 구성 오류는 모두 설정 로드 시점에 이 타입으로
/// 드러나야 하며, 런타임까지 미뤄지지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 알 수 없는 드라이버 종류
    #[error("missing or invalid driver: {0}")]
    UnknownDriver(String),

    /// 드라이버가 지원하지 않는 method
    #[error("invalid method {0}")]
    UnknownMethod(String),

    /// method에 허용되지 않는 action
    #[error("invalid action for path {path}: {action}")]
    UnknownAction { path: String, action: String },

    /// action에 허용되지 않는 조건
    #[error("invalid condition for action {action}: {condition}")]
    UnknownPredicate { action: String, condition: String },

    /// 경로가 필요한 method에 경로가 없음
    #[error("missing path for method {method}")]
    MissingPath { method: String },

    /// action 인자가 없거나 잘못됨
    #[error("invalid action argument for path {path}: {reason}")]
    InvalidActionArgument { path: String, reason: String },

    /// 중복 stage 번호
    #[error("{pipeline} has duplicate stage number defined")]
    DuplicateStage { pipeline: String },

    /// 중복 step 번호
    #[error("{pipeline} stage {stage} has missing or duplicate step numbers")]
    DuplicateStep { pipeline: String, stage: i64 },

    /// 알 수 없는 플러그인 id
    #[error("no defined plugin named {0} available")]
    UnknownPlugin(String),

    /// 플러그인 구성 실패
    #[error("error configuring plugin {plugin}: {reason}")]
    InvalidPlugin { plugin: String, reason: String },

    /// 파이프라인 배선 오류 (destination만 있고 source가 없는 경우 등)
    #[error("pipeline {pipeline} is not fully wired: {reason}")]
    UnresolvedPipeline { pipeline: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 레코드 처리 에러
///
/// 레코드 단위의 비치명적 에러입니다. 해당 레코드는 폐기되고
/// 에러는 파이프라인 에러 채널로 전달됩니다.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecordError {
    /// method가 값을 찾지 못함
    #[error("received nil value from method")]
    NilValue,

    /// 빈 페이로드 수신
    #[error("empty data received")]
    EmptyData,

    /// 중간 경로 세그먼트가 객체가 아님
    #[error("jsonpath is invalid: {0}")]
    InvalidPath(String),

    /// 직렬화 실패
    #[error("serializing record failed: {0}")]
    Serialize(String),

    /// 페이로드를 객체로 해석할 수 없음
    #[error("received nil object")]
    NotAnObject,

    /// changeJSON 대상이 객체가 아님
    #[error("received invalid JSON for changeJSON: {0}")]
    InvalidJson(String),
}

/// 플러그인 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 소스 플러그인 에러
    #[error("source {plugin}: {reason}")]
    Source { plugin: String, reason: String },

    /// 싱크 플러그인 에러
    #[error("sink {plugin}: {reason}")]
    Sink { plugin: String, reason: String },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}
