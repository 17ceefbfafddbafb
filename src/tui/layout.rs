use super::theme::{FAIL, OK};
use crate::package_manager::OperationResult;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// 标准布局：Header(3) + Content(弹性) + Status(1) + Footer(3)
pub fn main_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(area)
        .to_vec()
}

/// 标题居中，右侧附带 winget 状态
pub fn render_header(f: &mut Frame, title: &str, winget_available: Option<bool>, area: Rect) {
    let (badge, color) = match winget_available {
        Some(true) => ("winget ✓", OK),
        Some(false) => ("未找到 winget", FAIL),
        None => ("检测中...", Color::DarkGray),
    };
    let line = Line::from(vec![
        Span::styled(
            title.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format!("[{}]", badge), Style::default().fg(color)),
    ]);
    let header = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    f.render_widget(header, area);
}

pub fn render_footer(f: &mut Frame, text: &str, area: Rect) {
    let footer = Paragraph::new(format!(" {}", text))
        .style(Style::default().fg(Color::Green))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);
    f.render_widget(footer, area);
}

/// 状态行：进行中提示 + 最近一次操作的结果
pub fn render_status(f: &mut Frame, status: Option<&OperationResult>, busy: bool, area: Rect) {
    let mut spans = Vec::new();
    if busy {
        spans.push(Span::styled(" ⏳ 处理中...", Style::default().fg(Color::Yellow)));
    }
    let result = match status {
        None | Some(OperationResult::Loading) => None,
        Some(OperationResult::Success(msg)) => {
            Some(Span::styled(format!(" ✅ {}", msg), Style::default().fg(OK)))
        }
        Some(OperationResult::Error(msg)) => {
            Some(Span::styled(format!(" ❌ {}", msg), Style::default().fg(FAIL)))
        }
    };
    spans.extend(result);
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// 在 area 中央弹出带边框的对话框
pub fn render_popup(f: &mut Frame, title: &str, lines: Vec<Line>, border: Color, area: Rect) {
    let height = (lines.len() as u16 + 2).min(area.height);
    let [popup] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Percentage(60)])
        .flex(Flex::Center)
        .areas(popup);

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup,
    );
}
