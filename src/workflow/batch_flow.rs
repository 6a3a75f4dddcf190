//! 批次生成流程 - 流程层
//!
//! 核心职责：定义"一个批次"的完整生成流程
//!
//! 流程顺序：
//! 1. 调用生成能力（单次调用受 generation_timeout 限制）
//! 2. 校验返回内容
//! 3. 失败则按指数退避重试，最多 max_attempts 次
//! 4. 返回 GenerationOutcome（成功或失败都只写本批次的结果）

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::GenerationError;
use crate::infrastructure::{PromptChunk, PromptContext, QuestionGenerator};
use crate::models::{
    Batch, BatchStatus, CandidateQuestion, Chunk, ContextBundle, GenerationOutcome,
};
use crate::services::validate_payload;
use crate::utils::logging::truncate_text;
use crate::workflow::batch_ctx::BatchCtx;

/// 批次生成流程
///
/// - 编排单个批次的 生成 → 校验 → 重试
/// - 不关心其他批次，不持有共享可变状态
/// - 只依赖生成能力（infrastructure）和校验能力（services）
pub struct BatchFlow {
    generator: Arc<dyn QuestionGenerator>,
    config: Arc<Config>,
}

impl BatchFlow {
    /// 创建新的批次生成流程
    pub fn new(generator: Arc<dyn QuestionGenerator>, config: Arc<Config>) -> Self {
        Self { generator, config }
    }

    /// 构建一个批次的生成输入
    ///
    /// `chunks` 与 `contexts` 都按分块索引排列
    pub fn build_prompt(
        module_name: &str,
        batch: &Batch,
        chunks: &[Chunk],
        contexts: &[ContextBundle],
        question_types: &[String],
    ) -> PromptContext {
        let prompt_chunks = batch
            .chunk_indices
            .iter()
            .filter_map(|&idx| chunks.get(idx))
            .map(|chunk| PromptChunk {
                chunk_index: chunk.index,
                header_path: chunk.header_path.clone(),
                text: chunk.text.clone(),
                passages: contexts
                    .get(chunk.index)
                    .map(|bundle| bundle.passages.clone())
                    .unwrap_or_default(),
            })
            .collect();

        PromptContext {
            module_name: module_name.to_string(),
            batch_index: batch.batch_index,
            chunks: prompt_chunks,
            question_types: question_types.to_vec(),
        }
    }

    pub async fn run(&self, ctx: &BatchCtx) -> GenerationOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = GenerationError::DeadlineElapsed;

        for attempt in 1..=max_attempts {
            info!("{} 🤖 第 {}/{} 次生成...", ctx, attempt, max_attempts);

            match self.attempt(ctx).await {
                Ok((raw_payload, questions)) => {
                    info!("{} ✓ 生成成功，得到 {} 道有效题目", ctx, questions.len());
                    return GenerationOutcome {
                        batch_index: ctx.batch_index(),
                        chunk_indices: ctx.batch.chunk_indices.clone(),
                        attempts: attempt,
                        status: BatchStatus::Success {
                            raw_payload,
                            questions,
                        },
                    };
                }
                Err(e) => {
                    warn!("{} ⚠️ 第 {}/{} 次生成失败: {}", ctx, attempt, max_attempts, e);
                    last_error = e;

                    if attempt < max_attempts {
                        let backoff = self.config.retry_backoff(attempt);
                        self.log_backoff(ctx, backoff);
                        sleep(backoff).await;
                    }
                }
            }
        }

        error!(
            "{} ❌ 已重试 {} 次仍失败，批次被放弃: {}",
            ctx, max_attempts, last_error
        );

        GenerationOutcome::failed(
            ctx.batch_index(),
            ctx.batch.chunk_indices.clone(),
            max_attempts,
            last_error,
        )
    }

    /// 单次尝试：生成 + 校验
    async fn attempt(
        &self,
        ctx: &BatchCtx,
    ) -> Result<(String, Vec<CandidateQuestion>), GenerationError> {
        let limit = self.config.generation_timeout();

        let raw = timeout(
            limit,
            self.generator
                .generate(&ctx.prompt, ctx.target_count, self.config.temperature),
        )
        .await
        .map_err(|_| GenerationError::Timeout {
            secs: limit.as_secs(),
        })??;

        debug!("{} 原始返回: {}", ctx, truncate_text(&raw, 200));

        let questions = validate_payload(&raw, &ctx.batch)?;
        Ok((raw, questions))
    }

    // ========== 日志辅助方法 ==========

    fn log_backoff(&self, ctx: &BatchCtx, backoff: Duration) {
        info!("{} ⏳ 等待 {} 毫秒后重试...", ctx, backoff.as_millis());
    }
}
