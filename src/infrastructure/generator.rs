//! 题目生成能力 - 基础设施层
//!
//! 只暴露"根据上下文生成原始题目文本"的能力。调用可能耗时数分钟，
//! 也可能被并发调用（最多 max_workers 个）。

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GenerationError;

/// 一次生成调用的输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptContext {
    pub module_name: String,
    pub batch_index: usize,
    pub chunks: Vec<PromptChunk>,
    pub question_types: Vec<String>,
}

/// 批次中的单个分块及其检索上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptChunk {
    pub chunk_index: usize,
    pub header_path: Vec<String>,
    pub text: String,
    pub passages: Vec<String>,
}

impl PromptContext {
    pub fn chunk_indices(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.chunk_index).collect()
    }
}

/// 题目生成能力
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// 返回原始文本（通常是 JSON），由校验器负责解析
    async fn generate(
        &self,
        context: &PromptContext,
        target_count: usize,
        temperature: f32,
    ) -> Result<String, GenerationError>;
}
