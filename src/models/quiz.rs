use serde::{Deserialize, Serialize};

use crate::models::question::Question;

/// 生成方式标识
pub const GENERATION_METHOD: &str = "batched_rag";
/// 切分方式标识
pub const CHUNKING_METHOD: &str = "header_sections";

/// 最终测验文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(rename = "quiz_metadata")]
    pub metadata: QuizMetadata,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizMetadata {
    pub module_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    /// 去重后的题目数量
    pub total_questions: usize,
    /// 出现过的题目类型（按首次出现顺序）
    pub question_types: Vec<String>,
    pub generated_at: String,
    pub generation_method: String,
    pub chunks_total: usize,
    /// 至少贡献了一道保留题目的分块数量
    pub chunks_processed: usize,
    pub batches_total: usize,
    pub batches_succeeded: usize,
    pub failed_batches: Vec<usize>,
    pub duplicates_removed: usize,
    pub generation_config: GenerationConfig,
}

/// 实际生效的生成参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub chunking_method: String,
    pub batch_size: usize,
    pub questions_per_batch: usize,
    pub retrieval_top_k: usize,
    pub parallel_processing: bool,
    /// 截断后的实际并发数
    pub max_workers: usize,
    pub temperature: f32,
}

impl Quiz {
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
