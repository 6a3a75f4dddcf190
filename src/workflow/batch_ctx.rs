//! 批次处理上下文
//!
//! 封装"我正在处理第几个批次、它包含哪些分块"这一信息

use std::fmt::Display;

use crate::infrastructure::PromptContext;
use crate::models::Batch;

/// 批次处理上下文
///
/// 包含生成单个批次所需的全部输入，创建后不再修改
#[derive(Debug, Clone)]
pub struct BatchCtx {
    pub batch: Batch,

    /// 批次总数（仅用于日志显示）
    pub total_batches: usize,

    /// 生成调用的输入
    pub prompt: PromptContext,

    /// 本批次期望生成的题目数量
    pub target_count: usize,
}

impl BatchCtx {
    pub fn new(batch: Batch, total_batches: usize, prompt: PromptContext, target_count: usize) -> Self {
        Self {
            batch,
            total_batches,
            prompt,
            target_count,
        }
    }

    pub fn batch_index(&self) -> usize {
        self.batch.batch_index
    }
}

impl Display for BatchCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chunks: Vec<String> = self
            .batch
            .chunk_indices
            .iter()
            .map(|i| i.to_string())
            .collect();
        write!(
            f,
            "[批次 {}/{} 分块#{}]",
            self.batch.batch_index + 1,
            self.total_batches,
            chunks.join(",")
        )
    }
}
