//! 测验组装 - 编排层
//!
//! 把聚合结果包装成最终测验文档，填写元数据。

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::quiz::{CHUNKING_METHOD, GENERATION_METHOD};
use crate::models::{GenerationConfig, Quiz, QuizMetadata, QuizSettings};
use crate::orchestrator::aggregator::Aggregation;

/// `generated_at` 的格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// 时间来源，测试中可固定
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// 测验组装器
pub struct QuizAssembler {
    clock: Clock,
    temperature: f32,
}

impl QuizAssembler {
    pub fn new(clock: Clock, temperature: f32) -> Self {
        Self { clock, temperature }
    }

    pub fn assemble(
        &self,
        settings: &QuizSettings,
        aggregation: Aggregation,
        chunks_total: usize,
        effective_workers: usize,
    ) -> Quiz {
        let mut question_types: Vec<String> = Vec::new();
        for question in &aggregation.questions {
            if !question_types.contains(&question.question_type) {
                question_types.push(question.question_type.clone());
            }
        }

        let metadata = QuizMetadata {
            module_name: settings.module_name.clone(),
            course_id: settings.course_id.clone(),
            total_questions: aggregation.questions.len(),
            question_types,
            generated_at: (self.clock)().format(TIMESTAMP_FORMAT).to_string(),
            generation_method: GENERATION_METHOD.to_string(),
            chunks_total,
            chunks_processed: aggregation.chunks_processed,
            batches_total: aggregation.batches_total,
            batches_succeeded: aggregation.batches_succeeded,
            failed_batches: aggregation.failed_batches,
            duplicates_removed: aggregation.duplicates_removed,
            generation_config: GenerationConfig {
                chunking_method: CHUNKING_METHOD.to_string(),
                batch_size: settings.batch_size.get(),
                questions_per_batch: settings.questions_per_batch.get(),
                retrieval_top_k: settings.retrieval_top_k,
                parallel_processing: settings.parallel_processing,
                max_workers: effective_workers,
                temperature: self.temperature,
            },
        };

        Quiz {
            metadata,
            questions: aggregation.questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Question, QuizRequest};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn question(id: u32, question_type: &str) -> Question {
        Question {
            id,
            question_type: question_type.to_string(),
            stem: format!("q{}", id),
            options: BTreeMap::new(),
            correct_answer: "A".to_string(),
            explanation: String::new(),
            topic: String::new(),
            source_chunk_index: 0,
        }
    }

    fn fixed_clock() -> Clock {
        Arc::new(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap())
    }

    #[test]
    fn test_metadata_reflects_aggregation() {
        let settings = QuizRequest::new("# Networking\nTCP")
            .with_course_id("NET1")
            .with_batch_size(2)
            .normalize(&Config::default())
            .unwrap();
        let aggregation = Aggregation {
            questions: vec![question(1, "mcq"), question(2, "true_false"), question(3, "mcq")],
            chunks_processed: 2,
            batches_total: 2,
            batches_succeeded: 1,
            failed_batches: vec![1],
            duplicates_removed: 1,
        };

        let quiz = QuizAssembler::new(fixed_clock(), 0.3).assemble(&settings, aggregation, 3, 1);
        let meta = &quiz.metadata;

        assert_eq!(meta.module_name, "Networking");
        assert_eq!(meta.course_id.as_deref(), Some("NET1"));
        assert_eq!(meta.total_questions, 3);
        assert_eq!(meta.question_types, vec!["mcq", "true_false"]);
        assert_eq!(meta.generated_at, "2024-05-01T12:30:00Z");
        assert_eq!(meta.generation_method, "batched_rag");
        assert_eq!(meta.chunks_total, 3);
        assert_eq!(meta.failed_batches, vec![1]);
        assert_eq!(meta.generation_config.batch_size, 2);
        assert_eq!(meta.generation_config.chunking_method, "header_sections");
    }
}
