//! 外部命令执行（stdout/stderr 合并、超时、取消）

use super::types::CommandOutput;
use crate::error::RunError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 轮询子进程状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 取消标志，可在多个线程间共享
///
/// 内部是一个取消计数。`child()` 派生的标志只响应派生之后的 `cancel()`，
/// 一次取消不会波及之后才启动的命令。
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    generation: Arc<AtomicU64>,
    since: u64,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求终止当前正在运行的子进程
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// 为单次命令派生标志（每次执行前调用）
    pub fn child(&self) -> Self {
        Self {
            generation: Arc::clone(&self.generation),
            since: self.generation.load(Ordering::SeqCst),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.since
    }
}

/// 执行一条命令行并返回合并后的输出
///
/// 阻塞调用，调用方负责放到 `spawn_blocking` 中执行。
pub trait CommandRunner: Send + Sync + 'static {
    fn run(
        &self,
        command_line: &str,
        timeout: Duration,
        cancel: &CancelFlag,
    ) -> Result<CommandOutput, RunError>;
}

/// 通过 shell 解释器（默认 PowerShell）执行命令
#[derive(Debug, Clone)]
pub struct ShellRunner {
    pub shell: String,
    pub shell_args: Vec<String>,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>, shell_args: Vec<String>) -> Self {
        Self {
            shell: shell.into(),
            shell_args,
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(
            "powershell.exe",
            vec!["-NoProfile".to_string(), "-Command".to_string()],
        )
    }
}

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command_line: &str,
        timeout: Duration,
        cancel: &CancelFlag,
    ) -> Result<CommandOutput, RunError> {
        log::debug!("Executing {}", command_line);

        let mut args = self.shell_args.clone();
        args.push(command_line.to_string());

        let handle = duct::cmd(self.shell.as_str(), args)
            .stdin_null()
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .start()
            .map_err(|source| RunError::Launch {
                command: command_line.to_string(),
                source,
            })?;

        // 超时过大（溢出）时视为不限时
        let deadline = Instant::now().checked_add(timeout);
        let output = loop {
            let finished = handle.try_wait().map_err(|source| RunError::Wait {
                command: command_line.to_string(),
                source,
            })?;
            if let Some(output) = finished {
                break output;
            }

            if cancel.is_cancelled() {
                kill_quietly(&handle, command_line);
                return Err(RunError::Cancelled {
                    command: command_line.to_string(),
                });
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                kill_quietly(&handle, command_line);
                log::warn!("{} timed out after {:?}", command_line, timeout);
                return Err(RunError::TimedOut {
                    command: command_line.to_string(),
                    timeout,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let exit_code = output.status.code();
        log::debug!("Output of {} (exit={:?}): {}", command_line, exit_code, text);

        Ok(CommandOutput {
            output: text,
            exit_code,
        })
    }
}

/// 终止子进程；失败只记日志（进程可能已自行退出）
fn kill_quietly(handle: &duct::Handle, command_line: &str) {
    if let Err(e) = handle.kill() {
        log::warn!("failed to kill `{}`: {}", command_line, e);
    }
}
