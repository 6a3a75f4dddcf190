//! 批次调度器 - 编排层
//!
//! ## 职责
//!
//! 把每个批次交给 [`BatchFlow`] 执行，并控制执行方式：
//!
//! 1. **顺序模式**：按批次顺序逐个执行
//! 2. **并行模式**：使用 Semaphore 限制同时执行的批次数量
//! 3. **截止时间**：请求级截止时间到达后，未完成的批次被放弃并标记失败
//! 4. **结果隔离**：每个批次只写入自己的结果槽，调度器不合并题目
//! 5. **随请求取消**：调度 future 被丢弃时，并行模式下的批次任务一并取消
//!
//! 返回的结果按批次索引排列，与完成顺序无关。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use crate::error::GenerationError;
use crate::models::GenerationOutcome;
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::workflow::{BatchCtx, BatchFlow};

/// 执行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sequential,
    /// 最多 `workers` 个批次同时执行
    Parallel { workers: usize },
}

impl DispatchMode {
    pub fn new(parallel_processing: bool, workers: usize) -> Self {
        if parallel_processing {
            DispatchMode::Parallel {
                workers: workers.max(1),
            }
        } else {
            DispatchMode::Sequential
        }
    }
}

/// 批次调度器
pub struct Dispatcher {
    flow: Arc<BatchFlow>,
    deadline: Option<Duration>,
}

impl Dispatcher {
    pub fn new(flow: Arc<BatchFlow>, deadline: Option<Duration>) -> Self {
        Self { flow, deadline }
    }

    /// 执行全部批次，每个批次恰好对应一个结果
    pub async fn dispatch(&self, jobs: Vec<BatchCtx>, mode: DispatchMode) -> Vec<GenerationOutcome> {
        let deadline = self.deadline.map(|d| Instant::now() + d);

        let outcomes = match mode {
            DispatchMode::Sequential => self.run_sequential(jobs, deadline).await,
            DispatchMode::Parallel { workers } => {
                self.run_parallel(jobs, workers, deadline).await
            }
        };

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!("✓ 调度完成: 成功 {}/{} 个批次", succeeded, outcomes.len());

        outcomes
    }

    async fn run_sequential(
        &self,
        jobs: Vec<BatchCtx>,
        deadline: Option<Instant>,
    ) -> Vec<GenerationOutcome> {
        let mut outcomes = Vec::with_capacity(jobs.len());

        for ctx in jobs {
            let outcome = match deadline {
                Some(at) if Instant::now() >= at => {
                    warn!("{} ⏰ 截止时间已到，批次未开始即被放弃", ctx);
                    abandoned(&ctx)
                }
                Some(at) => {
                    log_batch_start(&ctx);
                    match timeout_at(at, self.flow.run(&ctx)).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!("{} ⏰ 截止时间已到，进行中的批次被放弃", ctx);
                            abandoned(&ctx)
                        }
                    }
                }
                None => {
                    log_batch_start(&ctx);
                    self.flow.run(&ctx).await
                }
            };

            log_batch_complete(&ctx, &outcome);
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn run_parallel(
        &self,
        jobs: Vec<BatchCtx>,
        workers: usize,
        deadline: Option<Instant>,
    ) -> Vec<GenerationOutcome> {
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        // JoinSet 被丢弃时其中的任务全部取消，调用方放弃请求后批次不会继续调用生成能力
        let mut tasks = JoinSet::new();
        let mut positions: HashMap<Id, usize> = HashMap::with_capacity(jobs.len());

        // 为每个批次创建任务，许可在任务内部获取
        for (position, ctx) in jobs.iter().enumerate() {
            let semaphore = semaphore.clone();
            let flow = self.flow.clone();
            let task_ctx = ctx.clone();

            let handle = tasks.spawn(async move {
                let permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| GenerationError::WorkerPanicked(e.to_string()));
                let outcome = match permit {
                    Ok(_permit) => {
                        log_batch_start(&task_ctx);
                        Ok(flow.run(&task_ctx).await)
                    }
                    Err(e) => Err(e),
                };
                (position, outcome)
            });
            positions.insert(handle.id(), position);
        }

        // 每个批次只写入自己的槽位，结果按批次顺序排列
        let mut slots: Vec<Option<GenerationOutcome>> = (0..jobs.len()).map(|_| None).collect();

        loop {
            let next = match deadline {
                Some(at) => match timeout_at(at, tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tasks.abort_all();
                        break;
                    }
                },
                None => tasks.join_next().await,
            };
            let Some(joined) = next else { break };

            match joined {
                Ok((position, Ok(outcome))) => slots[position] = Some(outcome),
                Ok((position, Err(e))) => {
                    let ctx = &jobs[position];
                    error!("{} ❌ 任务启动失败: {}", ctx, e);
                    slots[position] = Some(GenerationOutcome::failed(
                        ctx.batch_index(),
                        ctx.batch.chunk_indices.clone(),
                        0,
                        e,
                    ));
                }
                Err(e) => {
                    let Some(&position) = positions.get(&e.id()) else {
                        error!("❌ 未知任务执行失败: {}", e);
                        continue;
                    };
                    let ctx = &jobs[position];
                    error!("{} ❌ 任务执行失败: {}", ctx, e);
                    slots[position] = Some(GenerationOutcome::failed(
                        ctx.batch_index(),
                        ctx.batch.chunk_indices.clone(),
                        0,
                        GenerationError::WorkerPanicked(e.to_string()),
                    ));
                }
            }
        }

        jobs.iter()
            .zip(slots)
            .map(|(ctx, slot)| {
                let outcome = slot.unwrap_or_else(|| {
                    warn!("{} ⏰ 截止时间已到，批次被放弃", ctx);
                    abandoned(ctx)
                });
                log_batch_complete(ctx, &outcome);
                outcome
            })
            .collect()
    }
}

fn abandoned(ctx: &BatchCtx) -> GenerationOutcome {
    GenerationOutcome::failed(
        ctx.batch_index(),
        ctx.batch.chunk_indices.clone(),
        0,
        GenerationError::DeadlineElapsed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::infrastructure::{PromptContext, QuestionGenerator};
    use crate::models::Batch;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 批次 i 耗时 `delays[i]` 秒
    struct DelayedGenerator {
        delays: Vec<u64>,
        calls: AtomicUsize,
        completed: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl QuestionGenerator for DelayedGenerator {
        async fn generate(
            &self,
            context: &PromptContext,
            _target_count: usize,
            _temperature: f32,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(self.delays[context.batch_index])).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(format!(
                r#"[{{"question": "Q{}", "options": {{"A": "x", "B": "y"}}, "correct_answer": "A"}}]"#,
                context.batch_index
            ))
        }
    }

    fn jobs(n: usize) -> Vec<BatchCtx> {
        (0..n)
            .map(|i| {
                let batch = Batch {
                    batch_index: i,
                    chunk_indices: vec![i],
                };
                let prompt = PromptContext {
                    module_name: "M".to_string(),
                    batch_index: i,
                    chunks: vec![],
                    question_types: vec![],
                };
                BatchCtx::new(batch, n, prompt, 1)
            })
            .collect()
    }

    fn dispatcher(delays: Vec<u64>, deadline: Option<Duration>) -> (Dispatcher, Arc<DelayedGenerator>) {
        let generator = Arc::new(DelayedGenerator {
            delays,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = Arc::new(Config {
            max_attempts: 1,
            ..Config::default()
        });
        let flow = Arc::new(BatchFlow::new(generator.clone(), config));
        (Dispatcher::new(flow, deadline), generator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_results_follow_batch_order() {
        let (dispatcher, _) = dispatcher(vec![30, 10, 20, 1], None);
        let outcomes = dispatcher
            .dispatch(jobs(4), DispatchMode::Parallel { workers: 4 })
            .await;

        let order: Vec<usize> = outcomes.iter().map(|o| o.batch_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(outcomes.iter().all(|o| o.is_success()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_respects_worker_limit() {
        let (dispatcher, generator) = dispatcher(vec![5; 6], None);
        dispatcher
            .dispatch(jobs(6), DispatchMode::Parallel { workers: 2 })
            .await;

        assert_eq!(generator.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_runs_one_at_a_time() {
        let (dispatcher, generator) = dispatcher(vec![3, 1, 2], None);
        let outcomes = dispatcher.dispatch(jobs(3), DispatchMode::Sequential).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(generator.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_keeps_completed_batches() {
        // 批次 0 在 1 秒完成，批次 1 需要 100 秒，截止时间 10 秒
        let (dispatcher, _) = dispatcher(vec![1, 100], Some(Duration::from_secs(10)));
        let outcomes = dispatcher
            .dispatch(jobs(2), DispatchMode::Parallel { workers: 2 })
            .await;

        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].error(), Some(&GenerationError::DeadlineElapsed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_skips_unstarted_sequential_batches() {
        let (dispatcher, generator) = dispatcher(vec![20, 1, 1], Some(Duration::from_secs(10)));
        let outcomes = dispatcher.dispatch(jobs(3), DispatchMode::Sequential).await;

        assert!(outcomes.iter().all(|o| !o.is_success()));
        assert!(outcomes.iter().all(|o| o.attempts == 0));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_dispatch_cancels_running_batches() {
        let (dispatcher, generator) = dispatcher(vec![100; 4], None);
        let dispatch = dispatcher.dispatch(jobs(4), DispatchMode::Parallel { workers: 2 });

        // 调用方在 10 秒后放弃等待
        let result = tokio::time::timeout(Duration::from_secs(10), dispatch).await;
        assert!(result.is_err());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(500)).await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(generator.completed.load(Ordering::SeqCst), 0);
    }

    struct PanickingGenerator;

    #[async_trait]
    impl QuestionGenerator for PanickingGenerator {
        async fn generate(&self, context: &PromptContext, _: usize, _: f32) -> Result<String, GenerationError> {
            if context.batch_index == 1 {
                panic!("generator crashed");
            }
            Ok(r#"[{"question": "Q", "options": {"A": "x", "B": "y"}, "correct_answer": "A"}]"#.to_string())
        }
    }

    #[tokio::test]
    async fn test_panicking_worker_only_fails_its_batch() {
        let flow = Arc::new(BatchFlow::new(
            Arc::new(PanickingGenerator),
            Arc::new(Config::default()),
        ));
        let outcomes = Dispatcher::new(flow, None)
            .dispatch(jobs(3), DispatchMode::Parallel { workers: 3 })
            .await;

        assert!(outcomes[0].is_success());
        assert!(matches!(
            outcomes[1].error(),
            Some(GenerationError::WorkerPanicked(_))
        ));
        assert!(outcomes[2].is_success());
    }
}
