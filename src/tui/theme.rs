//! 界面配色，所有视图共用

use ratatui::style::Color;

/// 包名
pub const BLUE: Color = Color::Rgb(91, 206, 250);
/// 已标记行
pub const PINK: Color = Color::Rgb(245, 169, 184);
/// 选中行背景色
pub const SEL_BG: Color = Color::Rgb(45, 35, 55);
pub const BRIGHT_WHITE: Color = Color::Rgb(255, 255, 255);
/// 次要信息（Id、统计）
pub const DIM: Color = Color::Rgb(130, 130, 140);
/// 可升级版本
pub const UPGRADE: Color = Color::Rgb(250, 214, 102);
/// 状态行：成功 / 失败
pub const OK: Color = Color::Rgb(120, 220, 140);
pub const FAIL: Color = Color::Rgb(240, 110, 110);
