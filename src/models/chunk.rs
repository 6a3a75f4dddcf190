//! 分块、检索上下文与批次

use serde::{Deserialize, Serialize};

/// 模块内容分块
///
/// 由切分器按标题边界创建，index 从 0 开始连续分配，创建后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// 外层标题路径，例如 `["模块一", "基本概念"]`
    pub header_path: Vec<String>,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>, header_path: Vec<String>) -> Self {
        Self {
            index,
            text: text.into(),
            header_path,
        }
    }

    /// 分块标题（最内层标题），无标题时为 None
    pub fn title(&self) -> Option<&str> {
        self.header_path.last().map(String::as_str)
    }
}

/// 单个分块的检索结果
///
/// `passages` 为空表示检索未命中或检索降级，不是错误。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub chunk_index: usize,
    pub passages: Vec<String>,
}

impl ContextBundle {
    pub fn new(chunk_index: usize, passages: Vec<String>) -> Self {
        Self {
            chunk_index,
            passages,
        }
    }

    pub fn empty(chunk_index: usize) -> Self {
        Self::new(chunk_index, Vec::new())
    }
}

/// 一次生成调用处理的分块组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_index: usize,
    /// 升序排列的分块索引
    pub chunk_indices: Vec<usize>,
}

impl Batch {
    pub fn size(&self) -> usize {
        self.chunk_indices.len()
    }

    pub fn contains(&self, chunk_index: usize) -> bool {
        self.chunk_indices.contains(&chunk_index)
    }
}
