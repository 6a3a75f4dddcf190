use crate::error::GenerationError;
use crate::models::question::CandidateQuestion;

/// 单个批次的生成结果
///
/// 每个工作任务只写自己批次的结果槽，聚合器在所有批次结束后统一合并。
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub batch_index: usize,
    pub chunk_indices: Vec<usize>,
    /// 实际尝试次数（被截止时间放弃且从未开始的批次为 0）
    pub attempts: u32,
    pub status: BatchStatus,
}

#[derive(Debug, Clone)]
pub enum BatchStatus {
    Success {
        raw_payload: String,
        questions: Vec<CandidateQuestion>,
    },
    Failed {
        error: GenerationError,
    },
}

impl GenerationOutcome {
    pub fn failed(
        batch_index: usize,
        chunk_indices: Vec<usize>,
        attempts: u32,
        error: GenerationError,
    ) -> Self {
        Self {
            batch_index,
            chunk_indices,
            attempts,
            status: BatchStatus::Failed { error },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, BatchStatus::Success { .. })
    }

    pub fn error(&self) -> Option<&GenerationError> {
        match &self.status {
            BatchStatus::Failed { error } => Some(error),
            BatchStatus::Success { .. } => None,
        }
    }
}
