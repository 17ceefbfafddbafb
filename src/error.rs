//! 错误类型定义

use std::time::Duration;
use thiserror::Error;

/// 进程执行错误
#[derive(Debug, Error)]
pub enum RunError {
    /// 无法启动进程（可执行文件不存在、权限不足等）
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// 超时，子进程已被终止
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    /// 调用方取消，子进程已被终止
    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    /// 等待子进程时的 I/O 错误
    #[error("failed while waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RunError::TimedOut { .. })
    }
}

/// 单行解析错误（只记录日志，不中断整体解析）
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected at least 3 columns, found {0}")]
    TooFewColumns(usize),

    #[error("glued id/version field `{0}` has no separator")]
    MissingSeparator(String),

    #[error("row yields an empty package id")]
    EmptyId,
}

/// winget 操作错误
#[derive(Debug, Error)]
pub enum WingetError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error("Package {0} not found")]
    NotFound(String),

    #[error("{0} already in progress")]
    Busy(&'static str),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
