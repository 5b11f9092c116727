//! 数据项处理上下文
//!
//! 封装"我正在处理哪条流水线的第几条数据"这一信息

use std::fmt::Display;

/// 数据项处理上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 流水线名称
    pub pipeline: String,

    /// 数据在本批中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本批数据总数
    pub total: usize,

    /// 数据项 ID
    pub item_id: String,
}

impl ItemCtx {
    /// 创建新的上下文
    pub fn new(pipeline: impl Into<String>, index: usize, total: usize, item_id: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            index,
            total,
            item_id: item_id.into(),
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} #{}/{}]", self.pipeline, self.index, self.total)
    }
}
