//! winget 输出解析函数

use super::types::Package;
use crate::error::ParseError;
use regex::Regex;
use std::sync::OnceLock;

/// 表头 + 分隔线，始终跳过
const HEADER_LINES: usize = 2;
/// id 最大长度（按字符计）
pub const MAX_ID_LEN: usize = 100;

/// 两个及以上空白字符作为列分隔
fn column_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"\s{2,}").expect("valid column separator regex"))
}

/// 清理单行终端输出：只保留最后一个 `\r` 之后的内容（进度动画会就地覆盖），
/// 再去掉 ANSI 转义序列。不会增删行。
pub fn clean_terminal_line(line: &str) -> String {
    let visible = line.rsplit('\r').next().unwrap_or(line);
    strip_ansi_escapes::strip_str(visible)
}

/// 解析 `winget list` 的表格输出
///
/// 前两行（表头和分隔线）无条件丢弃，空行跳过；单行解析失败只记日志，不影响其余行。
pub fn parse_list(output: &str) -> Vec<Package> {
    output
        .lines()
        .skip(HEADER_LINES)
        .map(clean_terminal_line)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_row(&line) {
            Ok(pkg) => Some(pkg),
            Err(ParseError::TooFewColumns(_)) => None,
            Err(e) => {
                log::warn!("Error parsing package line: {} - {}", line, e);
                None
            }
        })
        .collect()
}

/// 解析一行表格
///
/// 列：`Name  Id  Version  [Available  Source]`。winget 有时会把 id 和版本挤在
/// 同一列（中间只有一个空格），此时第 3 列为空，需要从第 2 列末尾拆出版本号。
pub fn parse_row(line: &str) -> Result<Package, ParseError> {
    let parts: Vec<&str> = column_separator().split(line).map(str::trim).collect();
    if parts.len() < 3 {
        return Err(ParseError::TooFewColumns(parts.len()));
    }

    let name = parts[0];
    let id_and_version = parts[1];
    let version = parts[2];
    let available_version = parts.get(3).map(|s| s.to_string());

    let ends_with_digit = id_and_version
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_digit());

    let (id, version) = if ends_with_digit && version.is_empty() {
        split_glued(id_and_version)?
    } else {
        (id_and_version, version)
    };

    let id: String = id.chars().take(MAX_ID_LEN).collect();
    if id.is_empty() {
        return Err(ParseError::EmptyId);
    }

    Ok(Package::new(name, id, version, available_version))
}

/// 在最后一个空白字符处拆分 "id 版本"
fn split_glued(field: &str) -> Result<(&str, &str), ParseError> {
    let (idx, ws) = field
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .last()
        .ok_or_else(|| ParseError::MissingSeparator(field.to_string()))?;
    let id = field[..idx].trim();
    let version = field[idx + ws.len_utf8()..].trim();
    Ok((id, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Name                 Id                      Version      Available    Source\n\
                          ------------------------------------------------------------------------------\n";

    #[test]
    fn parses_seven_zip_row() {
        let raw = "Name  Id  Version  Available  Source\n\
                   ----  --  -------  ---------  ------\n\
                   7-Zip  7zip.7zip  23.01  24.07 winget  winget";
        let packages = parse_list(raw);
        assert_eq!(packages.len(), 1);
        let pkg = &packages[0];
        assert_eq!(pkg.name, "7-Zip");
        assert_eq!(pkg.id, "7zip.7zip");
        assert_eq!(pkg.version, "23.01");
        assert_eq!(pkg.available_version.as_deref(), Some("24.07 winget"));
    }

    #[test]
    fn first_two_lines_never_produce_records() {
        let raw = "Git  Git.Git  2.43.0\nNode.js  OpenJS.NodeJS  20.11.0\n";
        assert!(parse_list(raw).is_empty());

        let raw = "Git  Git.Git  2.43.0\nNode.js  OpenJS.NodeJS  20.11.0\nPython  Python.Python.3.12  3.12.1\n";
        let packages = parse_list(raw);
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].id, "Python.Python.3.12");
    }

    #[test]
    fn short_and_blank_rows_are_skipped() {
        let raw = format!(
            "{HEADER}\
             Git                  Git.Git                 2.43.0\n\
             \n\
             orphan continuation\n\
             Mozilla Firefox      Mozilla.Firefox         121.0        122.0        winget\n\
             only  two\n\
             \n\
             PowerToys            Microsoft.PowerToys     0.76.2\n"
        );
        let packages = parse_list(&raw);
        let ids: Vec<&str> = packages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["Git.Git", "Mozilla.Firefox", "Microsoft.PowerToys"]);
    }

    #[test]
    fn glued_id_and_version_are_split() {
        let pkg = parse_row("Contoso App  Contoso.App 1.2.3  ").unwrap();
        assert_eq!(pkg.id, "Contoso.App");
        assert_eq!(pkg.version, "1.2.3");
        assert_eq!(pkg.available_version, None);
    }

    #[test]
    fn id_ending_in_digit_with_version_column_is_kept() {
        let pkg = parse_row("Python 3.12  Python.Python.3.12  3.12.1").unwrap();
        assert_eq!(pkg.id, "Python.Python.3.12");
        assert_eq!(pkg.version, "3.12.1");
    }

    #[test]
    fn glued_field_without_space_is_rejected() {
        assert_eq!(
            parse_row("Tool  Tool123  "),
            Err(ParseError::MissingSeparator("Tool123".into()))
        );
    }

    #[test]
    fn long_id_is_truncated_to_limit() {
        let long_id = "a".repeat(150);
        let pkg = parse_row(&format!("Long  {long_id}  1.0")).unwrap();
        assert_eq!(pkg.id.chars().count(), MAX_ID_LEN);
    }

    #[test]
    fn two_column_rows_are_rejected() {
        assert_eq!(parse_row("Name    1.0"), Err(ParseError::TooFewColumns(2)));
        assert_eq!(parse_row("Name      "), Err(ParseError::TooFewColumns(2)));
        assert_eq!(parse_row("single"), Err(ParseError::TooFewColumns(1)));
    }

    #[test]
    fn mixed_whitespace_separates_columns() {
        assert_eq!(
            parse_row("Name   \t  x 2  "),
            Ok(Package::new("Name", "x", "2", None))
        );
    }

    #[test]
    fn spinner_and_ansi_noise_is_removed() {
        let raw = format!(
            "{HEADER}\r-\r\\\r|\rGit  Git.Git  2.43.0\n\x1b[32mNotepad++\x1b[0m  Notepad++.Notepad++  8.6\n"
        );
        let packages = parse_list(&raw);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "Git");
        assert_eq!(packages[1].name, "Notepad++");
    }
}
