//! 플러그인 trait — 소스/싱크 capability 및 확장 포인트 정의
//!
//! [`Source`]와 [`Sink`]는 외부 세계와 파이프라인 사이의 유일한
//! 접점입니다. 런타임은 구체 구현을 알지 못하고, 채널과 생명주기
//! 메서드만으로 플러그인을 다룹니다.
//!
//! # 채널 소유권
//! 수신 채널(`Receiver`)은 복제할 수 없으므로 `take_*` 메서드로 한 번만
//! 넘겨받습니다. 싱크의 목적지 채널(`Sender`)은 복제 가능하므로
//! `destination()`으로 몇 번이든 얻을 수 있습니다.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::LogpostError;

/// dyn-compatible Future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 데이터 소스 플러그인이 구현하는 capability trait
///
/// # 구현 예시
/// ```ignore
/// struct FileSource { /* ... */ }
///
/// impl Source for FileSource {
///     async fn start(&mut self) -> Result<(), LogpostError> {
///         // tail 태스크 스폰
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<(), LogpostError> {
///         // 태스크 취소 및 드레인 대기
///         Ok(())
///     }
///
///     fn take_output(&mut self) -> Option<mpsc::Receiver<Bytes>> {
///         self.data_rx.take()
///     }
///
///     fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>> {
///         self.err_rx.take()
///     }
/// }
/// ```
pub trait Source: Send + Sync {
    /// 플러그인을 시작합니다.
    ///
    /// 리소스 초기화와 수집 태스크 스폰을 수행합니다.
    /// 잘못 구성된 경우 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 플러그인을 정지합니다. Graceful shutdown을 수행합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 수집된 바이트를 전달하는 수신 채널을 넘겨줍니다.
    ///
    /// 최초 한 번만 Some을 반환합니다.
    fn take_output(&mut self) -> Option<mpsc::Receiver<Bytes>>;

    /// 실행 중 에러를 전달하는 수신 채널을 넘겨줍니다.
    ///
    /// 최초 한 번만 Some을 반환합니다.
    fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>>;
}

/// 데이터 싱크 플러그인이 구현하는 capability trait
pub trait Sink: Send + Sync {
    /// 플러그인을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 플러그인을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 데이터를 받을 송신 채널을 반환합니다. 복제 가능합니다.
    fn destination(&self) -> mpsc::Sender<Bytes>;

    /// 실행 중 에러를 전달하는 수신 채널을 넘겨줍니다.
    ///
    /// 최초 한 번만 Some을 반환합니다.
    fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>>;
}

/// dyn-compatible 소스 trait
///
/// `Source`는 RPITIT를 사용하므로 `dyn Source`가 불가합니다.
/// `DynSource`는 `BoxFuture`를 반환하여 `Vec<Box<dyn DynSource>>`로
/// 플러그인을 동적 관리할 수 있게 합니다.
pub trait DynSource: Send + Sync + std::fmt::Debug {
    /// 플러그인을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 플러그인을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 수집 채널을 넘겨줍니다.
    fn take_output(&mut self) -> Option<mpsc::Receiver<Bytes>>;

    /// 에러 채널을 넘겨줍니다.
    fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>>;
}

impl<T: Source + std::fmt::Debug> DynSource for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Source::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Source::stop(self))
    }

    fn take_output(&mut self) -> Option<mpsc::Receiver<Bytes>> {
        Source::take_output(self)
    }

    fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>> {
        Source::take_errors(self)
    }
}

/// dyn-compatible 싱크 trait
pub trait DynSink: Send + Sync + std::fmt::Debug {
    /// 플러그인을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 플러그인을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 목적지 채널을 반환합니다.
    fn destination(&self) -> mpsc::Sender<Bytes>;

    /// 에러 채널을 넘겨줍니다.
    fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>>;
}

impl<T: Sink + std::fmt::Debug> DynSink for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Sink::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Sink::stop(self))
    }

    fn destination(&self) -> mpsc::Sender<Bytes> {
        Sink::destination(self)
    }

    fn take_errors(&mut self) -> Option<mpsc::Receiver<LogpostError>> {
        Sink::take_errors(self)
    }
}
