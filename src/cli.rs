//! 非交互式子命令

use crate::package_manager::{
    Action, CommandRunner, OperationResult, Package, PackageService, ServiceEvent,
};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Parser)]
#[command(name = "lian-winget", version, about = "A TUI front-end for winget")]
pub struct Cli {
    /// 不带子命令时启动 TUI
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List installed packages
    List {
        /// Only packages with an available upgrade
        #[arg(long)]
        upgrades: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Upgrade one or more packages by id
    Upgrade {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Uninstall one or more packages by id
    Uninstall {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show a single installed package
    Details { id: String },
    /// Run the Windows disk cleanup utility
    Clean,
    /// Check whether winget is installed
    Check,
}

impl Command {
    fn into_action(self) -> Action {
        match self {
            Command::List { upgrades, .. } => Action::Refresh {
                upgrade_only: upgrades,
            },
            Command::Upgrade { mut ids } if ids.len() == 1 => Action::Upgrade(ids.remove(0)),
            Command::Upgrade { ids } => Action::BulkUpgrade(ids),
            Command::Uninstall { mut ids } if ids.len() == 1 => Action::Uninstall(ids.remove(0)),
            Command::Uninstall { ids } => Action::BulkUninstall(ids),
            Command::Details { id } => Action::Details(id),
            Command::Clean => Action::CleanDisk,
            Command::Check => Action::CheckWinget,
        }
    }
}

/// 执行子命令，返回是否成功
pub async fn run<R: CommandRunner>(command: Command, service: PackageService<R>) -> bool {
    let json = matches!(command, Command::List { json: true, .. });
    let action = command.into_action();
    // 升级/卸载之后的自动刷新不打印
    let print_packages = matches!(action, Action::Refresh { .. });

    let (tx, mut rx) = mpsc::channel(32);
    let task = tokio::spawn(async move { service.perform(action, &tx).await });

    let mut ok = true;
    while let Some(event) = rx.recv().await {
        match event {
            ServiceEvent::Status(OperationResult::Loading) => {}
            ServiceEvent::Status(OperationResult::Success(msg)) => println!("{}", msg),
            ServiceEvent::Status(OperationResult::Error(msg)) => {
                eprintln!("错误: {}", msg);
                ok = false;
            }
            ServiceEvent::Packages { packages, .. } if print_packages => {
                if json {
                    match serde_json::to_string_pretty(&packages) {
                        Ok(text) => println!("{}", text),
                        Err(e) => {
                            eprintln!("错误: {}", e);
                            ok = false;
                        }
                    }
                } else {
                    print!("{}", render_table(&packages));
                }
            }
            ServiceEvent::Packages { .. } => {}
            ServiceEvent::Details(pkg) => print!("{}", render_details(&pkg)),
            ServiceEvent::WingetAvailable(available) => {
                if available {
                    println!("winget is available");
                } else {
                    eprintln!("winget was not found");
                    ok = false;
                }
            }
        }
    }

    if let Err(e) = task.await {
        log::error!("worker task failed: {}", e);
        ok = false;
    }
    ok
}

/// 按显示宽度对齐的表格
pub fn render_table(packages: &[Package]) -> String {
    let headers = ["Name", "Id", "Version", "Available"];
    let rows: Vec<[&str; 4]> = packages
        .iter()
        .map(|pkg| {
            [
                pkg.name.as_str(),
                pkg.id.as_str(),
                pkg.version.as_str(),
                pkg.available_version.as_deref().unwrap_or(""),
            ]
        })
        .collect();

    let mut widths = headers.map(UnicodeWidthStr::width);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &headers, &widths);
    let rule_len = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
    out.push_str(&"-".repeat(rule_len));
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out.push_str(&format!("{} packages\n", packages.len()));
    out
}

fn push_row(out: &mut String, cells: &[&str; 4], widths: &[usize; 4]) {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        line.push_str(cell);
        if i + 1 < cells.len() {
            line.push_str(&" ".repeat(width.saturating_sub(cell.width()) + 2));
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn render_details(pkg: &Package) -> String {
    let available = pkg.available_version.as_deref().unwrap_or("");
    format!(
        "Name:       {}\nId:         {}\nVersion:    {}\nAvailable:  {}\nHas update: {}\n",
        pkg.name,
        pkg.id,
        if pkg.version.is_empty() { "-" } else { &pkg.version },
        if available.is_empty() { "-" } else { available },
        if pkg.has_update() { "yes" } else { "no" }
    )
}
