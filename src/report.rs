use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::PathBuf;

/// 保存升级/卸载/清理命令的原始输出，便于事后排查
#[derive(Debug, Clone)]
pub struct ReportSaver {
    base_dir: PathBuf,
}

impl ReportSaver {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn save(&self, kind: &str, command_line: &str, output: &str) -> Result<PathBuf> {
        let now = Local::now();

        // 目录结构: YYYY/MM/DD/
        let dir = self
            .base_dir
            .join(now.format("%Y").to_string())
            .join(now.format("%m").to_string())
            .join(now.format("%d").to_string());
        fs::create_dir_all(&dir)?;

        // 文件名: HH-MM-SS-<kind>.log，同一秒内重复则追加序号
        let stem = format!("{}-{}", now.format("%H-%M-%S"), kind);
        let mut filepath = dir.join(format!("{stem}.log"));
        let mut seq = 1;
        while filepath.exists() {
            filepath = dir.join(format!("{stem}-{seq}.log"));
            seq += 1;
        }

        let content = format!(
            "{} 报告\n生成时间: {}\n命令: {}\n\n{}\n",
            kind,
            now.format("%Y-%m-%d %H:%M:%S"),
            command_line,
            output
        );
        fs::write(&filepath, content)?;
        log::debug!("report saved to {}", filepath.display());

        Ok(filepath)
    }
}
