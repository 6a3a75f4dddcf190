//! 测验生成流水线 - 编排层入口
//!
//! 请求归一化 → 切分 → 检索 → 分批 → 调度 → 聚合 → 组装
//!
//! 只有配置错误和全部批次失败会返回给调用方；检索和单个批次的失败在内部被吸收。

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{QuestionGenerator, VectorStore};
use crate::models::{Quiz, QuizRequest};
use crate::orchestrator::aggregator::aggregate;
use crate::orchestrator::assembler::{system_clock, Clock, QuizAssembler};
use crate::orchestrator::dispatcher::{DispatchMode, Dispatcher};
use crate::services::{Batcher, Chunker, ContextRetriever};
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::{BatchCtx, BatchFlow};

/// 测验生成流水线
///
/// 可在多个请求间复用，请求之间不共享可变状态
pub struct QuizPipeline {
    config: Arc<Config>,
    retriever: ContextRetriever,
    flow: Arc<BatchFlow>,
    clock: Clock,
}

impl QuizPipeline {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        Self {
            retriever: ContextRetriever::new(store, &config),
            flow: Arc::new(BatchFlow::new(generator, config.clone())),
            clock: system_clock(),
            config,
        }
    }

    /// 替换时间来源（测试中用于得到完全相同的输出）
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn generate(&self, request: QuizRequest) -> AppResult<Quiz> {
        let started = Instant::now();

        // 1. 归一化请求（任何工作开始之前拒绝非法参数）
        let settings = request.normalize(&self.config)?;

        // 2. 切分
        let chunks = Chunker::new(self.config.chunk_split_depth).split(&settings.module_content);

        // 3. 分批
        let batches = Batcher::new(settings.batch_size).batch(&chunks);
        let workers = settings.effective_workers(batches.len(), self.config.max_workers_ceiling);
        log_startup(&settings, chunks.len(), batches.len(), workers);

        // 4. 检索（失败只降级为空上下文）
        let contexts = self
            .retriever
            .retrieve_all(
                settings.course_id.as_deref(),
                &chunks,
                settings.retrieval_top_k,
                workers,
            )
            .await;
        let with_context = contexts.iter().filter(|c| !c.passages.is_empty()).count();
        info!("🔍 检索完成: {}/{} 个分块获得上下文", with_context, chunks.len());

        // 5. 调度
        let total_batches = batches.len();
        let jobs: Vec<BatchCtx> = batches
            .into_iter()
            .map(|batch| {
                let prompt = BatchFlow::build_prompt(
                    &settings.module_name,
                    &batch,
                    &chunks,
                    &contexts,
                    &self.config.question_types,
                );
                BatchCtx::new(batch, total_batches, prompt, settings.questions_per_batch.get())
            })
            .collect();

        let dispatcher = Dispatcher::new(self.flow.clone(), self.config.request_deadline());
        let outcomes = dispatcher
            .dispatch(jobs, DispatchMode::new(settings.parallel_processing, workers))
            .await;

        // 6. 聚合
        let aggregation = aggregate(outcomes)?;

        // 7. 组装
        let quiz = QuizAssembler::new(self.clock.clone(), self.config.temperature).assemble(
            &settings,
            aggregation,
            chunks.len(),
            workers,
        );

        print_final_stats(&quiz, started.elapsed());

        Ok(quiz)
    }
}
