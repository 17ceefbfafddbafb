use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 用于执行 winget 命令的 shell
    pub shell: String,
    pub shell_args: Vec<String>,
    /// list / upgrade / uninstall 的超时（秒）
    pub command_timeout_secs: u64,
    /// 磁盘清理的超时（秒）
    pub cleanup_timeout_secs: u64,
    /// `winget --version` 检测的超时（秒）
    pub check_timeout_secs: u64,
    /// 单个升级/卸载成功后刷新列表前的等待（毫秒）
    pub refresh_delay_ms: u64,
    /// 是否保存升级/卸载/清理的命令输出
    pub save_reports: bool,
    pub report_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: "powershell.exe".to_string(),
            shell_args: vec!["-NoProfile".to_string(), "-Command".to_string()],
            command_timeout_secs: 600,
            cleanup_timeout_secs: 60,
            check_timeout_secs: 10,
            refresh_delay_ms: 1500,
            save_reports: false,
            report_dir: data_home().join("lian-winget").join("reports"),
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> PathBuf {
        config_home().join("lian-winget").join("config.toml")
    }

    /// TUI 模式下日志写入的目录
    pub fn log_dir() -> PathBuf {
        data_home().join("lian-winget")
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }
}

fn home() -> PathBuf {
    std::env::var("USERPROFILE")
        .or_else(|_| std::env::var("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Windows 下为 %APPDATA%，其余平台为 ~/.config
fn config_home() -> PathBuf {
    std::env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".config"))
}

/// Windows 下为 %LOCALAPPDATA%，其余平台为 ~/.local/share
fn data_home() -> PathBuf {
    std::env::var("LOCALAPPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".local").join("share"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cleanup_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "shell = \"pwsh\"\ncommand_timeout_secs = 120\nsave_reports = true\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.shell, "pwsh");
        assert_eq!(config.command_timeout(), Duration::from_secs(120));
        assert!(config.save_reports);
        assert_eq!(config.shell_args, Config::default().shell_args);
        assert_eq!(config.refresh_delay_ms, 1500);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "command_timeout_secs = \"soon\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
