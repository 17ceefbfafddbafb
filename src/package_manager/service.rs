//! 异步操作编排：每次调用先发出 `Loading`，再发出且只发出一个终态事件

use super::runner::{CommandRunner, ShellRunner};
use super::types::{OperationResult, Package};
use super::{Mutation, PackageManager};
use crate::error::WingetError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// 调用方请求的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Refresh { upgrade_only: bool },
    Upgrade(String),
    Uninstall(String),
    BulkUpgrade(Vec<String>),
    BulkUninstall(Vec<String>),
    Details(String),
    CleanDisk,
    CheckWinget,
}

/// 服务发往调用方的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    Status(OperationResult),
    Packages {
        upgrade_only: bool,
        packages: Vec<Package>,
    },
    Details(Package),
    WingetAvailable(bool),
}

/// 互斥粒度：同类操作同一时间只允许一个
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    List,
    Mutation,
    Cleanup,
    Check,
}

impl OpKind {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            OpKind::List => 0,
            OpKind::Mutation => 1,
            OpKind::Cleanup => 2,
            OpKind::Check => 3,
        }
    }

    fn label(self) -> &'static str {
        match self {
            OpKind::List => "Package listing",
            OpKind::Mutation => "Package operation",
            OpKind::Cleanup => "Disk cleanup",
            OpKind::Check => "Winget check",
        }
    }
}

impl Action {
    fn kind(&self) -> OpKind {
        match self {
            Action::Refresh { .. } | Action::Details(_) => OpKind::List,
            Action::Upgrade(_)
            | Action::Uninstall(_)
            | Action::BulkUpgrade(_)
            | Action::BulkUninstall(_) => OpKind::Mutation,
            Action::CleanDisk => OpKind::Cleanup,
            Action::CheckWinget => OpKind::Check,
        }
    }
}

/// 释放时自动清除占用标记
struct KindGuard<'a>(&'a AtomicBool);

impl Drop for KindGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

type EventSender = mpsc::Sender<ServiceEvent>;

pub struct PackageService<R = ShellRunner> {
    manager: Arc<PackageManager<R>>,
    in_flight: Arc<[AtomicBool; OpKind::COUNT]>,
    last_upgrade_only: Arc<AtomicBool>,
    refresh_delay: Duration,
}

impl<R> Clone for PackageService<R> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            in_flight: Arc::clone(&self.in_flight),
            last_upgrade_only: Arc::clone(&self.last_upgrade_only),
            refresh_delay: self.refresh_delay,
        }
    }
}

impl<R: CommandRunner> PackageService<R> {
    pub fn new(manager: PackageManager<R>, refresh_delay: Duration) -> Self {
        Self {
            manager: Arc::new(manager),
            in_flight: Arc::new(Default::default()),
            last_upgrade_only: Arc::new(AtomicBool::new(false)),
            refresh_delay,
        }
    }

    #[cfg(test)]
    pub fn manager(&self) -> &PackageManager<R> {
        &self.manager
    }

    /// 终止所有正在运行的子进程
    pub fn cancel(&self) {
        self.manager.cancel_flag().cancel();
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.iter().any(|flag| flag.load(Ordering::SeqCst))
    }

    fn try_acquire(&self, kind: OpKind) -> Option<KindGuard<'_>> {
        let flag = &self.in_flight[kind.index()];
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| KindGuard(flag))
    }

    /// 执行一个操作，事件通过 `tx` 发出
    pub async fn perform(&self, action: Action, tx: &EventSender) {
        log::debug!("perform {:?}", action);

        match action {
            Action::Refresh { upgrade_only } => self.refresh(upgrade_only, tx).await,
            Action::Details(id) => self.details(&id, tx).await,
            Action::Upgrade(id) => self.single(Mutation::Upgrade, &id, tx).await,
            Action::Uninstall(id) => self.single(Mutation::Uninstall, &id, tx).await,
            Action::BulkUpgrade(ids) => self.bulk(Mutation::Upgrade, &ids, tx).await,
            Action::BulkUninstall(ids) => self.bulk(Mutation::Uninstall, &ids, tx).await,
            Action::CleanDisk => self.clean_disk(tx).await,
            Action::CheckWinget => self.check_winget(tx).await,
        }
    }

    /// 发出 Loading 并占用该类操作；已被占用时直接发出 Busy 错误
    async fn begin(&self, kind: OpKind, tx: &EventSender) -> Option<KindGuard<'_>> {
        send(tx, ServiceEvent::Status(OperationResult::Loading)).await;
        let guard = self.try_acquire(kind);
        if guard.is_none() {
            log::warn!("{} already in progress, rejecting request", kind.label());
            let msg = WingetError::Busy(kind.label()).to_string();
            send(tx, ServiceEvent::Status(OperationResult::Error(msg))).await;
        }
        guard
    }

    async fn refresh(&self, upgrade_only: bool, tx: &EventSender) {
        let Some(_guard) = self.begin(OpKind::List, tx).await else {
            return;
        };
        self.last_upgrade_only.store(upgrade_only, Ordering::SeqCst);

        let event = match self.manager.list_packages(upgrade_only).await {
            Ok(packages) => ServiceEvent::Packages {
                upgrade_only,
                packages,
            },
            Err(e) => ServiceEvent::Status(OperationResult::Error(format!(
                "Failed to load packages: {}",
                e
            ))),
        };
        send(tx, event).await;
    }

    async fn details(&self, id: &str, tx: &EventSender) {
        let Some(_guard) = self.begin(OpKind::List, tx).await else {
            return;
        };
        let event = match self.manager.get_details(id).await {
            Ok(pkg) => ServiceEvent::Details(pkg),
            Err(e) => ServiceEvent::Status(OperationResult::Error(e.to_string())),
        };
        send(tx, event).await;
    }

    async fn single(&self, mutation: Mutation, id: &str, tx: &EventSender) {
        let result = {
            let Some(_guard) = self.begin(OpKind::Mutation, tx).await else {
                return;
            };
            let result = match mutation {
                Mutation::Upgrade => self.manager.upgrade(id).await,
                Mutation::Uninstall => self.manager.uninstall(id).await,
            };
            send(tx, ServiceEvent::Status(result.clone())).await;
            result
        };

        if let OperationResult::Success(_) = result {
            tokio::time::sleep(self.refresh_delay).await;
            self.refresh(self.last_upgrade_only.load(Ordering::SeqCst), tx)
                .await;
        }
    }

    /// 逐个（非并发）执行，最后发出一个汇总结果并刷新列表
    async fn bulk(&self, mutation: Mutation, ids: &[String], tx: &EventSender) {
        {
            let Some(_guard) = self.begin(OpKind::Mutation, tx).await else {
                return;
            };
            if ids.is_empty() {
                send(
                    tx,
                    ServiceEvent::Status(OperationResult::Error("No packages selected".to_string())),
                )
                .await;
                return;
            }

            let mut results = Vec::with_capacity(ids.len());
            for id in ids {
                let result = match mutation {
                    Mutation::Upgrade => self.manager.upgrade(id).await,
                    Mutation::Uninstall => self.manager.uninstall(id).await,
                };
                if let OperationResult::Error(msg) = &result {
                    log::warn!("{}", msg);
                }
                results.push(result);
            }

            send(tx, ServiceEvent::Status(bulk_summary(mutation, &results))).await;
        }

        self.refresh(self.last_upgrade_only.load(Ordering::SeqCst), tx)
            .await;
    }

    async fn clean_disk(&self, tx: &EventSender) {
        let Some(_guard) = self.begin(OpKind::Cleanup, tx).await else {
            return;
        };
        let result = self.manager.clean_disk().await;
        send(tx, ServiceEvent::Status(result)).await;
    }

    async fn check_winget(&self, tx: &EventSender) {
        let Some(_guard) = self.begin(OpKind::Check, tx).await else {
            return;
        };
        let available = self.manager.is_winget_available().await;
        send(tx, ServiceEvent::WingetAvailable(available)).await;
    }
}

/// 汇总批量结果；非 `Success` 一律计为失败，总数始终等于包数
fn bulk_summary(mutation: Mutation, results: &[OperationResult]) -> OperationResult {
    let verb = match mutation {
        Mutation::Upgrade => "Upgraded",
        Mutation::Uninstall => "Uninstalled",
    };
    let total = results.len();
    let succeeded = results
        .iter()
        .filter(|result| matches!(result, OperationResult::Success(_)))
        .count();
    let failed = total - succeeded;
    if failed == 0 {
        OperationResult::Success(format!("{} {} of {} packages", verb, succeeded, total))
    } else {
        OperationResult::Error(format!(
            "{} {} of {} packages, {} failed",
            verb, succeeded, total, failed
        ))
    }
}

async fn send(tx: &EventSender, event: ServiceEvent) {
    if tx.send(event).await.is_err() {
        log::debug!("event receiver dropped");
    }
}
