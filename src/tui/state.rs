use super::input::InputBox;
use crate::package_manager::{Action, Mutation, OperationResult, Package, ServiceEvent};
use std::collections::HashSet;

/// 当前交互模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMode {
    Browse,
    /// 正在编辑筛选框
    Filter,
    /// 等待确认的操作
    Confirm(Action),
    Details,
}

pub struct App {
    pub mode: AppMode,
    pub packages: Vec<Package>,
    /// 匹配筛选条件的包在 `packages` 中的索引
    pub filtered: Vec<usize>,
    /// 在 `filtered` 中的位置
    pub selected: usize,
    /// 按 id 标记，刷新后仍然保留
    pub marked: HashSet<String>,
    pub filter: InputBox,
    pub upgrade_only: bool,
    /// 最近一次终态结果
    pub status: Option<OperationResult>,
    /// 尚未收到终态事件的请求数
    pub pending: usize,
    pub details: Option<Package>,
    pub winget_available: Option<bool>,
    pub should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            mode: AppMode::Browse,
            packages: Vec::new(),
            filtered: Vec::new(),
            selected: 0,
            marked: HashSet::new(),
            filter: InputBox::new(),
            upgrade_only: false,
            status: None,
            pending: 0,
            details: None,
            winget_available: None,
            should_quit: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.pending > 0
    }

    /// 处理服务事件
    pub fn apply_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::Status(result) if !result.is_terminal() => {
                self.pending += 1;
                return;
            }
            ServiceEvent::Status(result) => {
                if let OperationResult::Error(msg) = &result {
                    log::warn!("操作失败: {}", msg);
                }
                self.status = Some(result);
            }
            ServiceEvent::Packages {
                upgrade_only,
                packages,
            } => self.set_packages(upgrade_only, packages),
            ServiceEvent::Details(pkg) => {
                self.details = Some(pkg);
                self.mode = AppMode::Details;
            }
            ServiceEvent::WingetAvailable(available) => {
                self.winget_available = Some(available);
                if !available {
                    self.status = Some(OperationResult::Error(
                        "未找到 winget，请先安装 App Installer".to_string(),
                    ));
                }
            }
        }
        self.pending = self.pending.saturating_sub(1);
    }

    fn set_packages(&mut self, upgrade_only: bool, packages: Vec<Package>) {
        let current_id = self.current().map(|pkg| pkg.id.clone());

        self.upgrade_only = upgrade_only;
        self.packages = packages;
        let ids: HashSet<&str> = self.packages.iter().map(|pkg| pkg.id.as_str()).collect();
        self.marked.retain(|id| ids.contains(id.as_str()));
        self.apply_filter();

        // 尽量保持光标停在原来的包上
        if let Some(id) = current_id {
            if let Some(pos) = self
                .filtered
                .iter()
                .position(|&idx| self.packages[idx].id == id)
            {
                self.selected = pos;
            }
        }
    }

    /// 按筛选框内容重建 `filtered`
    pub fn apply_filter(&mut self) {
        let keyword = self.filter.content().trim();
        self.filtered = self
            .packages
            .iter()
            .enumerate()
            .filter(|(_, pkg)| keyword.is_empty() || pkg.matches(keyword))
            .map(|(idx, _)| idx)
            .collect();
        self.selected = self.selected.min(self.filtered.len().saturating_sub(1));
    }

    pub fn current(&self) -> Option<&Package> {
        self.filtered
            .get(self.selected)
            .and_then(|&idx| self.packages.get(idx))
    }

    pub fn move_up(&mut self, step: usize) {
        self.selected = self.selected.saturating_sub(step);
    }

    pub fn move_down(&mut self, step: usize) {
        let max = self.filtered.len().saturating_sub(1);
        self.selected = (self.selected + step).min(max);
    }

    pub fn move_to_end(&mut self) {
        self.selected = self.filtered.len().saturating_sub(1);
    }

    /// 切换当前行的标记并下移
    pub fn toggle_mark(&mut self) {
        let Some(id) = self.current().map(|pkg| pkg.id.clone()) else {
            return;
        };
        if !self.marked.remove(&id) {
            self.marked.insert(id);
        }
        self.move_down(1);
    }

    /// 可见行全部已标记则全部取消，否则全部标记
    pub fn toggle_mark_all(&mut self) {
        let visible: Vec<String> = self
            .filtered
            .iter()
            .map(|&idx| self.packages[idx].id.clone())
            .collect();
        if visible.iter().all(|id| self.marked.contains(id)) {
            for id in &visible {
                self.marked.remove(id);
            }
        } else {
            self.marked.extend(visible);
        }
    }

    /// 操作目标：有标记时为所有标记项（按列表顺序），否则为当前行
    pub fn target_ids(&self) -> Vec<String> {
        if self.marked.is_empty() {
            return self.current().map(|pkg| pkg.id.clone()).into_iter().collect();
        }
        self.packages
            .iter()
            .filter(|pkg| self.marked.contains(&pkg.id))
            .map(|pkg| pkg.id.clone())
            .collect()
    }

    /// 单个目标用单项操作，多个目标用批量操作
    pub fn mutation_action(&self, mutation: Mutation) -> Option<Action> {
        let mut ids = self.target_ids();
        match (ids.len(), mutation) {
            (0, _) => None,
            (1, Mutation::Upgrade) => Some(Action::Upgrade(ids.remove(0))),
            (1, Mutation::Uninstall) => Some(Action::Uninstall(ids.remove(0))),
            (_, Mutation::Upgrade) => Some(Action::BulkUpgrade(ids)),
            (_, Mutation::Uninstall) => Some(Action::BulkUninstall(ids)),
        }
    }
}

/// 确认框中的提示文字
pub fn confirm_prompt(action: &Action) -> String {
    match action {
        Action::Upgrade(id) => format!("升级 {} ?", id),
        Action::Uninstall(id) => format!("卸载 {} ?", id),
        Action::BulkUpgrade(ids) => format!("升级 {} 个软件包: {} ?", ids.len(), ids.join(", ")),
        Action::BulkUninstall(ids) => {
            format!("卸载 {} 个软件包: {} ?", ids.len(), ids.join(", "))
        }
        Action::CleanDisk => "运行磁盘清理 (cleanmgr /sagerun:1) ?".to_string(),
        Action::Refresh { .. } | Action::Details(_) | Action::CheckWinget => {
            format!("{:?} ?", action)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Package> {
        vec![
            Package::new("7-Zip", "7zip.7zip", "22.01", Some("23.01".into())),
            Package::new("Git", "Git.Git", "2.43.0", Some(String::new())),
            Package::new("Microsoft Edge", "Microsoft.Edge", "120.0", Some(String::new())),
        ]
    }

    fn loaded() -> App {
        let mut app = App::new();
        app.apply_event(ServiceEvent::Status(OperationResult::Loading));
        app.apply_event(ServiceEvent::Packages {
            upgrade_only: false,
            packages: sample(),
        });
        app
    }

    #[test]
    fn loading_and_terminal_events_balance() {
        let app = loaded();
        assert!(!app.is_busy());
        assert_eq!(app.filtered, vec![0, 1, 2]);
    }

    #[test]
    fn filter_matches_name_or_id() {
        let mut app = loaded();
        "git".chars().for_each(|c| app.filter.insert(c));
        app.apply_filter();
        assert_eq!(app.filtered, vec![1]);

        app.filter.clear();
        "7ZIP.".chars().for_each(|c| app.filter.insert(c));
        app.apply_filter();
        assert_eq!(app.current().map(|p| p.name.as_str()), Some("7-Zip"));
    }

    #[test]
    fn single_target_uses_current_row() {
        let mut app = loaded();
        app.move_down(1);
        assert_eq!(
            app.mutation_action(Mutation::Upgrade),
            Some(Action::Upgrade("Git.Git".into()))
        );
    }

    #[test]
    fn marked_rows_become_bulk_action_in_list_order() {
        let mut app = loaded();
        app.move_to_end();
        app.toggle_mark();
        app.move_up(10);
        app.toggle_mark();
        assert_eq!(
            app.mutation_action(Mutation::Uninstall),
            Some(Action::BulkUninstall(vec![
                "7zip.7zip".into(),
                "Microsoft.Edge".into()
            ]))
        );
    }

    #[test]
    fn refresh_drops_marks_for_missing_packages_and_keeps_cursor() {
        let mut app = loaded();
        app.toggle_mark_all();
        app.move_to_end();

        app.apply_event(ServiceEvent::Packages {
            upgrade_only: true,
            packages: vec![sample().remove(0), sample().remove(2)],
        });

        assert!(app.upgrade_only);
        assert_eq!(app.marked.len(), 2);
        assert!(!app.marked.contains("Git.Git"));
        assert_eq!(app.current().map(|p| p.id.as_str()), Some("Microsoft.Edge"));
    }

    #[test]
    fn empty_list_has_no_action() {
        let app = App::new();
        assert_eq!(app.mutation_action(Mutation::Upgrade), None);
    }

    #[test]
    fn details_event_opens_details() {
        let mut app = loaded();
        app.apply_event(ServiceEvent::Status(OperationResult::Loading));
        app.apply_event(ServiceEvent::Details(sample().remove(1)));
        assert_eq!(app.mode, AppMode::Details);
        assert!(!app.is_busy());
    }

    #[test]
    fn missing_winget_sets_error_status() {
        let mut app = App::new();
        app.apply_event(ServiceEvent::Status(OperationResult::Loading));
        app.apply_event(ServiceEvent::WingetAvailable(false));
        assert_eq!(app.winget_available, Some(false));
        assert!(matches!(app.status, Some(OperationResult::Error(_))));
    }
}
