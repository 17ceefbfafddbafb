use super::input::render_input_box;
use super::layout;
use super::state::{confirm_prompt, App, AppMode};
use super::theme::{BLUE, BRIGHT_WHITE, DIM, FAIL, PINK, SEL_BG, UPGRADE};
use crate::package_manager::{Action, Mutation, Package};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// 处理按键，返回需要交给服务执行的操作
pub fn handle_key(key: KeyEvent, app: &mut App, page: usize) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return None;
    }

    match app.mode.clone() {
        AppMode::Browse => handle_browse_key(key, app, page),
        AppMode::Filter => {
            handle_filter_key(key, app);
            None
        }
        AppMode::Confirm(action) => handle_confirm_key(key, app, action),
        AppMode::Details => {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')
            ) {
                app.mode = AppMode::Browse;
                app.details = None;
            }
            None
        }
    }
}

fn handle_browse_key(key: KeyEvent, app: &mut App, page: usize) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Up | KeyCode::Char('k') => app.move_up(1),
        KeyCode::Down | KeyCode::Char('j') => app.move_down(1),
        KeyCode::PageUp => app.move_up(page.max(1)),
        KeyCode::PageDown => app.move_down(page.max(1)),
        KeyCode::Home => app.selected = 0,
        KeyCode::End => app.move_to_end(),
        KeyCode::Char('/') => app.mode = AppMode::Filter,
        KeyCode::Char(' ') => app.toggle_mark(),
        KeyCode::Char('a') => app.toggle_mark_all(),
        KeyCode::Esc => {
            // 先清标记，再清筛选
            if !app.marked.is_empty() {
                app.marked.clear();
            } else if !app.filter.content().is_empty() {
                app.filter.clear();
                app.apply_filter();
            }
        }
        KeyCode::Char('r') => {
            return Some(Action::Refresh {
                upgrade_only: app.upgrade_only,
            })
        }
        // 列表模式随 Packages 事件更新，刷新失败时保持原样
        KeyCode::Char('u') => {
            return Some(Action::Refresh {
                upgrade_only: !app.upgrade_only,
            });
        }
        KeyCode::Enter => {
            return app.current().map(|pkg| Action::Details(pkg.id.clone()));
        }
        KeyCode::Char('U') => {
            if let Some(action) = app.mutation_action(Mutation::Upgrade) {
                app.mode = AppMode::Confirm(action);
            }
        }
        KeyCode::Char('D') => {
            if let Some(action) = app.mutation_action(Mutation::Uninstall) {
                app.mode = AppMode::Confirm(action);
            }
        }
        KeyCode::Char('c') => app.mode = AppMode::Confirm(Action::CleanDisk),
        _ => {}
    }
    None
}

fn handle_filter_key(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Enter => app.mode = AppMode::Browse,
        KeyCode::Esc => {
            app.filter.clear();
            app.apply_filter();
            app.mode = AppMode::Browse;
        }
        KeyCode::Up => app.move_up(1),
        KeyCode::Down => app.move_down(1),
        KeyCode::Left => app.filter.move_left(),
        KeyCode::Right => app.filter.move_right(),
        KeyCode::Home => app.filter.move_home(),
        KeyCode::End => app.filter.move_end(),
        KeyCode::Backspace => {
            app.filter.delete_back();
            app.apply_filter();
        }
        KeyCode::Delete => {
            app.filter.delete_forward();
            app.apply_filter();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.filter.insert(c);
            app.apply_filter();
        }
        _ => {}
    }
}

fn handle_confirm_key(key: KeyEvent, app: &mut App, action: Action) -> Option<Action> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            app.mode = AppMode::Browse;
            if action != Action::CleanDisk {
                app.marked.clear();
            }
            Some(action)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.mode = AppMode::Browse;
            None
        }
        _ => None,
    }
}

// ===== 渲染 =====

pub fn render(f: &mut Frame, app: &App) {
    let chunks = layout::main_layout(f.area());

    layout::render_header(f, "📦 Winget 软件包管理", app.winget_available, chunks[0]);
    render_content(f, app, chunks[1]);
    layout::render_status(f, app.status.as_ref(), app.is_busy(), chunks[2]);
    layout::render_footer(f, footer_text(app), chunks[3]);

    match &app.mode {
        AppMode::Confirm(action) => {
            let lines = vec![
                Line::from(""),
                Line::from(Span::styled(
                    confirm_prompt(action),
                    Style::default().fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(Span::styled("y 确认  /  n 取消", Style::default().fg(DIM))),
            ];
            layout::render_popup(f, "确认", lines, FAIL, chunks[1]);
        }
        AppMode::Details => {
            if let Some(pkg) = &app.details {
                layout::render_popup(f, "详细信息", details_lines(pkg), Color::Cyan, chunks[1]);
            }
        }
        AppMode::Browse | AppMode::Filter => {}
    }
}

fn footer_text(app: &App) -> &'static str {
    match app.mode {
        AppMode::Filter => "输入关键词筛选 | Enter 完成 | Esc 清空",
        AppMode::Confirm(_) => "y 确认 | n/Esc 取消",
        AppMode::Details => "Esc 关闭",
        AppMode::Browse if app.marked.is_empty() => {
            "↑↓ 选择 | Space 标记 | / 筛选 | u 仅可升级 | U 升级 | D 卸载 | Enter 详情 | c 清理 | r 刷新 | q 退出"
        }
        AppMode::Browse => "Space 标记/取消 | a 全选 | U 升级标记项 | D 卸载标记项 | Esc 清除标记",
    }
}

fn render_content(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.upgrade_only { " 可升级 " } else { " 已安装 " };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    if padded.height < 3 {
        return;
    }

    // 分割：筛选框 + 统计 + 列表
    let inner_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(padded);

    render_input_box(
        f,
        &app.filter,
        "> 筛选:",
        app.mode == AppMode::Filter,
        inner_chunks[0],
    );

    let upgradable = app.packages.iter().filter(|pkg| pkg.has_update()).count();
    let stat = format!(
        "共 {} 个匹配 / {} 个软件包 / {} 个可升级 / 已标记 {} 个",
        app.filtered.len(),
        app.packages.len(),
        upgradable,
        app.marked.len()
    );
    f.render_widget(
        Paragraph::new(stat).style(Style::default().fg(Color::DarkGray)),
        inner_chunks[1],
    );

    render_package_list(f, app, inner_chunks[2]);
}

fn render_package_list(f: &mut Frame, app: &App, area: Rect) {
    if app.filtered.is_empty() {
        let hint = if app.is_busy() && app.packages.is_empty() {
            "  正在加载软件包列表..."
        } else {
            "  没有匹配的软件包"
        };
        f.render_widget(
            Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
            area,
        );
        return;
    }

    let visible_height = area.height as usize;
    let total = app.filtered.len();
    let scroll = list_scroll(app.selected, visible_height);

    let rows: Vec<&Package> = app
        .filtered
        .iter()
        .skip(scroll)
        .take(visible_height)
        .filter_map(|&idx| app.packages.get(idx))
        .collect();

    // 按可见行计算列宽
    let name_width = rows.iter().map(|p| p.name.width()).max().unwrap_or(0);
    let id_width = rows.iter().map(|p| p.id.width()).max().unwrap_or(0);

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .map(|(offset, pkg)| {
            let is_selected = scroll + offset == app.selected;
            let is_marked = app.marked.contains(&pkg.id);
            package_line(pkg, is_selected, is_marked, name_width, id_width)
        })
        .collect();

    f.render_widget(Paragraph::new(lines), area);

    // 滚动条
    if total > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));
        let mut state = ScrollbarState::new(total).position(scroll);
        f.render_stateful_widget(scrollbar, area, &mut state);
    }
}

/// 让选中行始终可见
fn list_scroll(selected: usize, visible_height: usize) -> usize {
    if visible_height == 0 {
        0
    } else {
        selected.saturating_sub(visible_height - 1)
    }
}

fn package_line<'a>(
    pkg: &'a Package,
    is_selected: bool,
    is_marked: bool,
    name_width: usize,
    id_width: usize,
) -> Line<'a> {
    let cursor = if is_selected { ">" } else { " " };
    let marker = if is_marked { "[✓]" } else { "   " };
    let gutter = format!("{}{}", cursor, marker);

    let name = pad(&pkg.name, name_width);
    let id = pad(&pkg.id, id_width);
    let available = pkg.available_version.as_deref().unwrap_or("");
    let upgrade = if pkg.has_update() {
        format!("  → {}", available)
    } else {
        String::new()
    };

    let base = if is_selected {
        Style::default().bg(SEL_BG)
    } else {
        Style::default()
    };
    let name_style = match (is_selected, is_marked) {
        (true, _) => base.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD),
        (false, true) => base.fg(PINK),
        (false, false) => base.fg(BLUE),
    };
    let gutter_style = if is_marked { base.fg(PINK) } else { base.fg(Color::White) };

    Line::from(vec![
        Span::styled(gutter, gutter_style),
        Span::styled(name, name_style),
        Span::styled(id, base.fg(DIM)),
        Span::styled(pkg.version.as_str(), base.fg(Color::White)),
        Span::styled(upgrade, base.fg(UPGRADE).add_modifier(Modifier::BOLD)),
    ])
}

/// 按显示宽度右侧补空格，再留两格间距
fn pad(text: &str, width: usize) -> String {
    format!("{}{}", text, " ".repeat(width.saturating_sub(text.width()) + 2))
}

fn details_lines(pkg: &Package) -> Vec<Line<'static>> {
    let available = pkg.available_version.as_deref().unwrap_or("");
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    vec![
        info_line("名称      ", pkg.name.clone()),
        info_line("Id        ", pkg.id.clone()),
        info_line("版本      ", or_dash(&pkg.version)),
        info_line("可用版本  ", or_dash(available)),
        info_line(
            "可升级    ",
            if pkg.has_update() { "是" } else { "否" }.to_string(),
        ),
    ]
}

fn info_line(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {}", label), Style::default().fg(DIM)),
        Span::styled(value, Style::default().fg(BRIGHT_WHITE)),
    ])
}
