//! PackageManager 相关数据类型定义

use serde::Serialize;

/// winget list 表格中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub version: String,
    /// 仅在存在可用升级时有值；规范化后总是 `Some`（可能为空串）
    pub available_version: Option<String>,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
        available_version: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            available_version,
        }
    }

    /// 可用版本非空且与当前版本不同
    pub fn has_update(&self) -> bool {
        match self.available_version.as_deref() {
            Some(available) => !available.is_empty() && available != self.version,
            None => false,
        }
    }

    /// 名称或 id 包含关键词（忽略大小写）
    pub fn matches(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.name.to_lowercase().contains(&keyword) || self.id.to_lowercase().contains(&keyword)
    }
}

/// 异步操作的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Loading,
    Success(String),
    Error(String),
}

impl OperationResult {
    pub fn is_terminal(&self) -> bool {
        match self {
            OperationResult::Loading => false,
            OperationResult::Success(_) | OperationResult::Error(_) => true,
        }
    }
}

/// 命令输出结果（stdout 与 stderr 已合并）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
