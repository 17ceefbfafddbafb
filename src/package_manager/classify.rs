//! 根据命令输出判断升级/卸载是否成功
//!
//! winget 对这两类操作没有可靠的退出码约定，这里只做子串匹配（忽略大小写）。
//! 判定逻辑集中在 [`Mutation::succeeded`]，措辞变化时只需改这一处。

/// 会修改系统状态的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Upgrade,
    Uninstall,
}

impl Mutation {
    /// 视为成功的输出片段。"无事可做" 也算成功。
    pub fn success_markers(self) -> &'static [&'static str] {
        match self {
            Mutation::Upgrade => &["Successfully installed", "No applicable update found"],
            Mutation::Uninstall => &["Successfully uninstalled", "No installed package found"],
        }
    }

    pub fn succeeded(self, output: &str) -> bool {
        let output = output.to_lowercase();
        self.success_markers()
            .iter()
            .any(|marker| output.contains(&marker.to_lowercase()))
    }

    pub fn label(self) -> &'static str {
        match self {
            Mutation::Upgrade => "upgrade",
            Mutation::Uninstall => "uninstall",
        }
    }
}
