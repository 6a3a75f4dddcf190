//! 结果聚合 - 编排层
//!
//! 在所有批次结束之后才运行，是唯一合并题目的地方：
//! 按批次顺序合并 → 按来源分块稳定排序 → 按规范化题干去重 → 从 1 开始编号。

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info};

use crate::error::AppError;
use crate::models::{BatchStatus, GenerationOutcome, Question};

/// 聚合结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub questions: Vec<Question>,
    /// 至少贡献了一道保留题目的分块数量
    pub chunks_processed: usize,
    pub batches_total: usize,
    pub batches_succeeded: usize,
    /// 失败批次的索引（升序）
    pub failed_batches: Vec<usize>,
    pub duplicates_removed: usize,
}

/// 合并所有批次结果
///
/// 全部批次失败时返回 [`AppError::TotalGenerationFailure`]
pub fn aggregate(mut outcomes: Vec<GenerationOutcome>) -> Result<Aggregation, AppError> {
    outcomes.sort_by_key(|o| o.batch_index);

    let batches_total = outcomes.len();
    let mut failed_batches = Vec::new();
    let mut last_error = None;
    let mut merged = Vec::new();

    for outcome in outcomes {
        match outcome.status {
            BatchStatus::Success { questions, .. } => merged.extend(questions),
            BatchStatus::Failed { error } => {
                failed_batches.push(outcome.batch_index);
                last_error = Some(error);
            }
        }
    }

    let batches_succeeded = batches_total - failed_batches.len();
    if batches_succeeded == 0 {
        return Err(AppError::TotalGenerationFailure {
            failed_batches: failed_batches.len(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "没有可执行的批次".to_string()),
        });
    }

    // 稳定排序：同一分块内保持批次内顺序
    merged.sort_by_key(|q| q.source_chunk_index);

    let mut seen = HashSet::new();
    let mut contributing_chunks = BTreeSet::new();
    let mut questions = Vec::with_capacity(merged.len());
    let mut duplicates_removed = 0;

    for candidate in merged {
        if !seen.insert(candidate.normalized_stem()) {
            duplicates_removed += 1;
            debug!("去除重复题目: {}", candidate.stem);
            continue;
        }
        contributing_chunks.insert(candidate.source_chunk_index);
        let id = questions.len() as u32 + 1;
        questions.push(candidate.into_question(id));
    }

    info!(
        "📋 聚合完成: {} 道题目，去重 {} 道，失败批次 {:?}",
        questions.len(),
        duplicates_removed,
        failed_batches
    );

    Ok(Aggregation {
        questions,
        chunks_processed: contributing_chunks.len(),
        batches_total,
        batches_succeeded,
        failed_batches,
        duplicates_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::models::CandidateQuestion;
    use std::collections::BTreeMap;

    fn candidate(stem: &str, chunk: usize) -> CandidateQuestion {
        CandidateQuestion {
            question_type: "mcq".to_string(),
            stem: stem.to_string(),
            options: BTreeMap::from([
                ("A".to_string(), "x".to_string()),
                ("B".to_string(), "y".to_string()),
            ]),
            correct_answer: "A".to_string(),
            explanation: String::new(),
            topic: String::new(),
            source_chunk_index: chunk,
        }
    }

    fn success(batch_index: usize, chunks: Vec<usize>, questions: Vec<CandidateQuestion>) -> GenerationOutcome {
        GenerationOutcome {
            batch_index,
            chunk_indices: chunks,
            attempts: 1,
            status: BatchStatus::Success {
                raw_payload: String::new(),
                questions,
            },
        }
    }

    fn failure(batch_index: usize, chunks: Vec<usize>) -> GenerationOutcome {
        GenerationOutcome::failed(
            batch_index,
            chunks,
            3,
            GenerationError::Timeout { secs: 3000 },
        )
    }

    #[test]
    fn test_merge_order_ignores_completion_order() {
        let outcomes = vec![
            success(1, vec![2, 3], vec![candidate("c", 2), candidate("d", 3)]),
            success(0, vec![0, 1], vec![candidate("a", 0), candidate("b", 1)]),
        ];
        let result = aggregate(outcomes).unwrap();

        let stems: Vec<&str> = result.questions.iter().map(|q| q.stem.as_str()).collect();
        let ids: Vec<u32> = result.questions.iter().map(|q| q.id).collect();
        assert_eq!(stems, vec!["a", "b", "c", "d"]);
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(result.chunks_processed, 4);
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let outcomes = vec![
            success(0, vec![0], vec![candidate("What is  Rust?", 0)]),
            success(1, vec![1], vec![candidate("what is rust?", 1), candidate("Other", 1)]),
        ];
        let result = aggregate(outcomes).unwrap();

        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.questions.len(), 2);
        assert_eq!(result.questions[0].stem, "What is  Rust?");
        assert_eq!(result.questions[1].id, 2);
    }

    #[test]
    fn test_partial_failure_keeps_successful_batches_only() {
        let outcomes = vec![
            success(0, vec![0, 1], vec![candidate("a", 0), candidate("b", 0)]),
            failure(1, vec![2, 3]),
            success(2, vec![4], vec![candidate("c", 4)]),
        ];
        let result = aggregate(outcomes).unwrap();

        assert_eq!(result.questions.len(), 3);
        assert_eq!(result.failed_batches, vec![1]);
        assert_eq!(result.batches_succeeded, 2);
        // 分块 1 没有贡献题目
        assert_eq!(result.chunks_processed, 2);
    }

    #[test]
    fn test_all_failed_is_total_failure() {
        let err = aggregate(vec![failure(0, vec![0]), failure(1, vec![1])]).unwrap_err();
        match err {
            AppError::TotalGenerationFailure {
                failed_batches,
                last_error,
            } => {
                assert_eq!(failed_batches, 2);
                assert!(last_error.contains("3000"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_no_batches_is_total_failure() {
        assert!(matches!(
            aggregate(Vec::new()),
            Err(AppError::TotalGenerationFailure { failed_batches: 0, .. })
        ));
    }
}
