//! 包管理器模块：对 winget 的封装

pub mod classify;
pub mod normalize;
pub mod parser;
pub mod runner;
pub mod service;
pub mod types;

// 重新导出常用类型和函数
pub use classify::Mutation;
pub use runner::{CancelFlag, CommandRunner, ShellRunner};
pub use service::{Action, PackageService, ServiceEvent};
pub use types::{CommandOutput, OperationResult, Package};

use crate::config::Config;
use crate::error::WingetError;
use crate::report::ReportSaver;
use normalize::normalize;
use parser::parse_list;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const CLEANUP_COMMAND: &str = "cleanmgr /sagerun:1";
const VERSION_COMMAND: &str = "winget --version";

#[derive(Debug)]
pub struct PackageManager<R = ShellRunner> {
    runner: Arc<R>,
    cancel: CancelFlag,
    command_timeout: Duration,
    cleanup_timeout: Duration,
    check_timeout: Duration,
    reports: Option<ReportSaver>,
}

impl PackageManager<ShellRunner> {
    pub fn from_config(config: &Config) -> Self {
        let runner = ShellRunner::new(config.shell.clone(), config.shell_args.clone());
        Self::with_runner(runner, config)
    }
}

impl<R: CommandRunner> PackageManager<R> {
    pub fn with_runner(runner: R, config: &Config) -> Self {
        let reports = config
            .save_reports
            .then(|| ReportSaver::new(config.report_dir.clone()));
        Self {
            runner: Arc::new(runner),
            cancel: CancelFlag::new(),
            command_timeout: config.command_timeout(),
            cleanup_timeout: config.cleanup_timeout(),
            check_timeout: config.check_timeout(),
            reports,
        }
    }

    /// 取消标志，`cancel()` 会终止正在运行的子进程
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// 在阻塞线程池中执行命令
    async fn run(&self, command_line: String, timeout: Duration) -> Result<CommandOutput, WingetError> {
        let runner = Arc::clone(&self.runner);
        let cancel = self.cancel.child();
        let output = tokio::task::spawn_blocking(move || runner.run(&command_line, timeout, &cancel))
            .await??;
        Ok(output)
    }

    // ===== 查询 =====

    /// 获取已安装包列表（可只列出有升级的包）
    pub async fn list_packages(&self, upgrade_only: bool) -> Result<Vec<Package>, WingetError> {
        let output = self.run(list_command(upgrade_only), self.command_timeout).await?;
        let packages: Vec<Package> = parse_list(&output.output)
            .into_iter()
            .map(normalize)
            .collect();
        log::info!("winget list returned {} packages", packages.len());
        Ok(packages)
    }

    /// 获取单个包的信息
    ///
    /// winget 没有对应的详情命令，这里重新执行完整列表再按 id 查找。
    pub async fn get_details(&self, package_id: &str) -> Result<Package, WingetError> {
        self.list_packages(false)
            .await?
            .into_iter()
            .find(|pkg| pkg.id == package_id)
            .ok_or_else(|| WingetError::NotFound(package_id.to_string()))
    }

    /// 检查 winget 是否可用
    pub async fn is_winget_available(&self) -> bool {
        match self.run(VERSION_COMMAND.to_string(), self.check_timeout).await {
            Ok(output) => {
                log::info!("Winget check output: {}", output.output);
                output.success()
            }
            Err(e) => {
                log::warn!("Error checking winget availability: {}", e);
                false
            }
        }
    }

    // ===== 升级 / 卸载 =====

    pub async fn upgrade(&self, package_id: &str) -> OperationResult {
        self.mutate(Mutation::Upgrade, package_id).await
    }

    pub async fn uninstall(&self, package_id: &str) -> OperationResult {
        self.mutate(Mutation::Uninstall, package_id).await
    }

    async fn mutate(&self, mutation: Mutation, package_id: &str) -> OperationResult {
        let command_line = match mutation {
            Mutation::Upgrade => upgrade_command(package_id),
            Mutation::Uninstall => uninstall_command(package_id),
        };

        let succeeded = match self.run(command_line.clone(), self.command_timeout).await {
            Ok(output) => {
                log::info!("{} output for {}: {}", mutation.label(), package_id, output.output);
                self.save_report(mutation.label(), &command_line, &output.output);
                mutation.succeeded(&output.output)
            }
            Err(e) => {
                log::error!("Error running {} for {}: {}", mutation.label(), package_id, e);
                self.save_report(mutation.label(), &command_line, &e.to_string());
                return OperationResult::Error(format!(
                    "Failed to {} package {}: {}",
                    mutation.label(),
                    package_id,
                    e
                ));
            }
        };

        match (mutation, succeeded) {
            (Mutation::Upgrade, true) => {
                OperationResult::Success(format!("Package {} upgraded successfully", package_id))
            }
            (Mutation::Uninstall, true) => {
                OperationResult::Success(format!("Package {} uninstalled successfully", package_id))
            }
            (_, false) => OperationResult::Error(format!(
                "Failed to {} package {}",
                mutation.label(),
                package_id
            )),
        }
    }

    // ===== 磁盘清理 =====

    pub async fn clean_disk(&self) -> OperationResult {
        let result = match self.run(CLEANUP_COMMAND.to_string(), self.cleanup_timeout).await {
            Ok(output) => {
                self.save_report("cleanup", CLEANUP_COMMAND, &output.output);
                if output.success() {
                    OperationResult::Success("Disk Cleanup Manager completed successfully".to_string())
                } else {
                    OperationResult::Error(format!(
                        "Failed to run Disk Cleanup Manager: {}",
                        output.output
                    ))
                }
            }
            Err(WingetError::Run(e)) if e.is_timeout() => {
                OperationResult::Error("Disk Cleanup Manager timed out".to_string())
            }
            Err(e) => OperationResult::Error(format!("Error launching Disk Cleanup Manager: {}", e)),
        };
        log::info!("cleanup finished: {:?}", result);
        result
    }

    fn save_report(&self, kind: &str, command_line: &str, output: &str) {
        if let Some(saver) = &self.reports {
            if let Err(e) = saver.save(kind, command_line, output) {
                log::error!("保存报告失败: {}", e);
            }
        }
    }
}

// ===== 命令模板 =====

pub fn list_command(upgrade_only: bool) -> String {
    let mut command = String::from("winget list --disable-interactivity");
    if upgrade_only {
        command.push_str(" --upgrade-available");
    }
    command
}

pub fn upgrade_command(package_id: &str) -> String {
    format!(
        "winget upgrade -q \"{}\" --accept-source-agreements --accept-package-agreements",
        escape_quotes(package_id)
    )
}

pub fn uninstall_command(package_id: &str) -> String {
    format!(
        "winget uninstall -q \"{}\" --accept-source-agreements",
        escape_quotes(&clean_uninstall_id(package_id))
    )
}

pub fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// 卸载前去掉 id 中的版本号片段和孤立的点
pub fn clean_uninstall_id(package_id: &str) -> String {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    let (version_token, stray_dot) = PATTERNS.get_or_init(|| {
        (
            Regex::new(r"\s*\d+(\.\d+)?\s*").expect("valid version token regex"),
            Regex::new(r"\s*\.\s*").expect("valid stray dot regex"),
        )
    });
    let without_versions = version_token.replace_all(package_id, " ");
    stray_dot
        .replace_all(&without_versions, " ")
        .trim()
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::RunError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按顺序返回预设结果，并记录执行过的命令
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub responses: Mutex<VecDeque<Result<CommandOutput, RunError>>>,
        pub commands: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn with(responses: Vec<Result<CommandOutput, RunError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                commands: Mutex::new(Vec::new()),
            }
        }
    }

    pub fn ok(output: &str) -> Result<CommandOutput, RunError> {
        Ok(CommandOutput {
            output: output.to_string(),
            exit_code: Some(0),
        })
    }

    impl CommandRunner for ScriptedRunner {
        fn run(
            &self,
            command_line: &str,
            timeout: Duration,
            cancel: &CancelFlag,
        ) -> Result<CommandOutput, RunError> {
            self.commands.lock().unwrap().push(command_line.to_string());
            if cancel.is_cancelled() {
                return Err(RunError::Cancelled {
                    command: command_line.to_string(),
                });
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(RunError::TimedOut {
                        command: command_line.to_string(),
                        timeout,
                    })
                })
        }
    }

    pub const LIST_OUTPUT: &str = "Name               Id                  Version   Available  Source\n\
                                   -----------------------------------------------------------------\n\
                                   7-Zip              7zip.7zip           23.01     24.07 winget  winget\n\
                                   Git                Git.Git             2.43.0                winget\n\
                                   Contoso App        Contoso.App 1.2.3   \n\
                                   Store App          9NBLGGH4NNS1        Unknown\n";

    fn manager(responses: Vec<Result<CommandOutput, RunError>>) -> PackageManager<ScriptedRunner> {
        PackageManager::with_runner(ScriptedRunner::with(responses), &Config::default())
    }

    fn commands(pm: &PackageManager<ScriptedRunner>) -> Vec<String> {
        pm.runner.commands.lock().unwrap().clone()
    }

    #[test]
    fn command_templates() {
        assert_eq!(list_command(false), "winget list --disable-interactivity");
        assert_eq!(
            list_command(true),
            "winget list --disable-interactivity --upgrade-available"
        );
        assert_eq!(
            upgrade_command("Say \"Hi\".App"),
            "winget upgrade -q \"Say \\\"Hi\\\".App\" --accept-source-agreements --accept-package-agreements"
        );
        assert_eq!(
            uninstall_command("Mozilla.Firefox"),
            "winget uninstall -q \"Mozilla Firefox\" --accept-source-agreements"
        );
    }

    #[test]
    fn uninstall_id_cleanup_strips_versions_and_dots() {
        assert_eq!(clean_uninstall_id("Python.Python.3.12"), "Python Python");
        assert_eq!(clean_uninstall_id("Mozilla.Firefox"), "Mozilla Firefox");
        assert_eq!(clean_uninstall_id("Foo 1.2"), "Foo");
        assert_eq!(clean_uninstall_id("7zip.7zip"), "zip zip");
    }

    #[tokio::test]
    async fn list_parses_and_normalizes() {
        let pm = manager(vec![ok(LIST_OUTPUT)]);
        let packages = pm.list_packages(true).await.unwrap();

        assert_eq!(
            commands(&pm),
            ["winget list --disable-interactivity --upgrade-available"]
        );
        assert_eq!(packages.len(), 4);

        let seven_zip = &packages[0];
        assert_eq!(seven_zip.id, "7zip.7zip");
        assert_eq!(seven_zip.available_version.as_deref(), Some("24.07"));
        assert!(seven_zip.has_update());

        assert_eq!(packages[2].id, "Contoso.App");
        assert_eq!(packages[2].version, "1.2.3");

        assert_eq!(packages[3].version, "");
        assert!(packages.iter().all(|p| p.available_version.is_some()));
    }

    #[tokio::test]
    async fn upgrade_classifies_output() {
        let pm = manager(vec![ok("Successfully installed"), ok("Access is denied.")]);

        assert_eq!(
            pm.upgrade("Git.Git").await,
            OperationResult::Success("Package Git.Git upgraded successfully".into())
        );
        assert_eq!(
            pm.upgrade("Git.Git").await,
            OperationResult::Error("Failed to upgrade package Git.Git".into())
        );
    }

    #[tokio::test]
    async fn uninstall_message_keeps_original_id() {
        let pm = manager(vec![ok("No installed package found matching input criteria.")]);
        assert_eq!(
            pm.uninstall("Python.Python.3.12").await,
            OperationResult::Success("Package Python.Python.3.12 uninstalled successfully".into())
        );
        assert_eq!(
            commands(&pm),
            ["winget uninstall -q \"Python Python\" --accept-source-agreements"]
        );
    }

    #[tokio::test]
    async fn launch_failure_becomes_error_result() {
        let launch = Err(RunError::Launch {
            command: "winget".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "program not found"),
        });
        let pm = manager(vec![launch]);
        match pm.upgrade("Git.Git").await {
            OperationResult::Error(msg) => assert!(msg.contains("program not found")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn details_scans_full_list() {
        let pm = manager(vec![ok(LIST_OUTPUT), ok(LIST_OUTPUT)]);

        let git = pm.get_details("Git.Git").await.unwrap();
        assert_eq!(git.version, "2.43.0");

        let missing = pm.get_details("Nope.Nope").await.unwrap_err();
        assert!(matches!(missing, WingetError::NotFound(ref id) if id == "Nope.Nope"));
        assert!(commands(&pm).iter().all(|c| c == "winget list --disable-interactivity"));
    }

    #[tokio::test]
    async fn cleanup_reports_timeout_distinctly() {
        let pm = manager(vec![]);
        assert_eq!(
            pm.clean_disk().await,
            OperationResult::Error("Disk Cleanup Manager timed out".into())
        );
        assert_eq!(commands(&pm), ["cleanmgr /sagerun:1"]);
    }

    #[tokio::test]
    async fn cleanup_non_zero_exit_carries_output() {
        let pm = manager(vec![Ok(CommandOutput {
            output: "cleanmgr is not recognized".into(),
            exit_code: Some(1),
        })]);
        assert_eq!(
            pm.clean_disk().await,
            OperationResult::Error("Failed to run Disk Cleanup Manager: cleanmgr is not recognized".into())
        );
    }

    #[tokio::test]
    async fn winget_availability_follows_exit_code() {
        let pm = manager(vec![
            ok("v1.7.10861"),
            Ok(CommandOutput {
                output: "not recognized".into(),
                exit_code: Some(1),
            }),
        ]);
        assert!(pm.is_winget_available().await);
        assert!(!pm.is_winget_available().await);
        assert!(!pm.is_winget_available().await);
    }
}
