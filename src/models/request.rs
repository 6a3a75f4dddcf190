//! 请求入口适配
//!
//! 新旧两套字段命名（`module_content` / `modulecontent`、`course_id` / `courseID` 等）
//! 只在这里被识别，归一化成 [`QuizSettings`] 之后，流水线内部不再关心字段来源。

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ConfigError;

/// 未提供模块名且首行不是标题时使用的名称
pub const FALLBACK_MODULE_NAME: &str = "Generated Module";

/// 测验生成请求（原始形态）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulecontent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, rename = "courseID", alias = "courseid", skip_serializing_if = "Option::is_none")]
    pub legacy_course_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_top_k: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_per_batch: Option<i64>,
    /// 旧版按分块计数的题目数量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_per_chunk: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_processing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<i64>,
}

/// 归一化后的请求参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    pub module_content: String,
    pub module_name: String,
    pub course_id: Option<String>,
    /// 0 表示不做检索
    pub retrieval_top_k: usize,
    pub batch_size: NonZeroUsize,
    pub questions_per_batch: NonZeroUsize,
    pub parallel_processing: bool,
    pub max_workers: NonZeroUsize,
}

impl QuizRequest {
    pub fn new(module_content: impl Into<String>) -> Self {
        Self {
            module_content: Some(module_content.into()),
            ..Default::default()
        }
    }

    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    pub fn with_course_id(mut self, course_id: impl Into<String>) -> Self {
        self.course_id = Some(course_id.into());
        self
    }

    pub fn with_retrieval_top_k(mut self, top_k: i64) -> Self {
        self.retrieval_top_k = Some(top_k);
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_questions_per_batch(mut self, count: i64) -> Self {
        self.questions_per_batch = Some(count);
        self
    }

    pub fn with_parallel(mut self, max_workers: i64) -> Self {
        self.parallel_processing = Some(true);
        self.max_workers = Some(max_workers);
        self
    }

    /// 归一化请求：合并新旧字段、补全默认值并校验数值参数
    pub fn normalize(&self, config: &Config) -> Result<QuizSettings, ConfigError> {
        let module_content = first_non_blank(&[&self.module_content, &self.modulecontent])
            .ok_or(ConfigError::EmptyModuleContent)?;

        let module_name = first_non_blank(&[&self.module_name, &self.modulename])
            .unwrap_or_else(|| infer_module_name(&module_content));

        let course_id = first_non_blank(&[&self.course_id, &self.legacy_course_id]);

        let batch_size = positive(
            "batch_size",
            self.batch_size.unwrap_or(config.default_batch_size as i64),
        )?;

        let questions_per_batch = match (self.questions_per_batch, self.questions_per_chunk) {
            (Some(count), _) => positive("questions_per_batch", count)?,
            (None, Some(per_chunk)) => {
                let per_chunk = positive("questions_per_chunk", per_chunk)?;
                per_chunk.saturating_mul(batch_size)
            }
            (None, None) => positive(
                "questions_per_batch",
                config.default_questions_per_batch as i64,
            )?,
        };

        let max_workers = positive(
            "max_workers",
            self.max_workers.unwrap_or(config.default_max_workers as i64),
        )?;

        let top_k = self
            .retrieval_top_k
            .unwrap_or(config.default_retrieval_top_k as i64);
        if top_k < 0 {
            return Err(ConfigError::Negative {
                field: "retrieval_top_k",
                value: top_k,
            });
        }

        Ok(QuizSettings {
            module_content,
            module_name,
            course_id,
            retrieval_top_k: top_k as usize,
            batch_size,
            questions_per_batch,
            parallel_processing: self
                .parallel_processing
                .unwrap_or(config.default_parallel_processing),
            max_workers,
        })
    }
}

impl QuizSettings {
    /// 实际并发数：顺序模式为 1，并行模式截断到批次数和全局上限
    pub fn effective_workers(&self, batch_count: usize, ceiling: usize) -> usize {
        if !self.parallel_processing {
            return 1;
        }
        self.max_workers
            .get()
            .min(batch_count.max(1))
            .min(ceiling.max(1))
    }
}

/// 从首行标题推断模块名
pub fn infer_module_name(content: &str) -> String {
    let first_line = content.trim_start().lines().next().unwrap_or_default().trim();
    if first_line.starts_with('#') {
        let title = first_line.trim_start_matches('#').trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }
    FALLBACK_MODULE_NAME.to_string()
}

fn first_non_blank(candidates: &[&Option<String>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|value| value.as_deref())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn positive(field: &'static str, value: i64) -> Result<NonZeroUsize, ConfigError> {
    usize::try_from(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or(ConfigError::NonPositive { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_come_from_config() {
        let settings = QuizRequest::new("# Intro\ntext").normalize(&Config::default()).unwrap();
        assert_eq!(settings.module_name, "Intro");
        assert_eq!(settings.retrieval_top_k, 3);
        assert_eq!(settings.batch_size.get(), 2);
        assert_eq!(settings.questions_per_batch.get(), 3);
        assert!(!settings.parallel_processing);
        assert_eq!(settings.max_workers.get(), 1);
        assert_eq!(settings.course_id, None);
    }

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let json = r#"{
            "modulecontent": "body without header",
            "modulename": "Legacy Module",
            "courseID": "CS101",
            "questions_per_chunk": 2,
            "batch_size": 3
        }"#;
        let request: QuizRequest = serde_json::from_str(json).unwrap();
        let settings = request.normalize(&Config::default()).unwrap();

        assert_eq!(settings.module_content, "body without header");
        assert_eq!(settings.module_name, "Legacy Module");
        assert_eq!(settings.course_id.as_deref(), Some("CS101"));
        assert_eq!(settings.questions_per_batch.get(), 6);
    }

    #[test]
    fn test_current_field_wins_over_legacy() {
        let request = QuizRequest {
            module_content: Some("current".to_string()),
            modulecontent: Some("legacy".to_string()),
            course_id: Some("new".to_string()),
            legacy_course_id: Some("old".to_string()),
            ..Default::default()
        };
        let settings = request.normalize(&Config::default()).unwrap();
        assert_eq!(settings.module_content, "current");
        assert_eq!(settings.course_id.as_deref(), Some("new"));
    }

    #[test]
    fn test_blank_current_field_falls_back_to_legacy() {
        let request = QuizRequest {
            module_content: Some("   ".to_string()),
            modulecontent: Some("legacy".to_string()),
            ..Default::default()
        };
        let settings = request.normalize(&Config::default()).unwrap();
        assert_eq!(settings.module_content, "legacy");
        assert_eq!(settings.module_name, FALLBACK_MODULE_NAME);
    }

    #[test]
    fn test_empty_content_is_rejected() {
        let err = QuizRequest::default().normalize(&Config::default()).unwrap_err();
        assert_eq!(err, ConfigError::EmptyModuleContent);
    }

    #[test]
    fn test_non_positive_knobs_are_rejected() {
        let config = Config::default();
        let cases = [
            (QuizRequest::new("x").with_batch_size(0), "batch_size", 0),
            (QuizRequest::new("x").with_batch_size(-2), "batch_size", -2),
            (QuizRequest::new("x").with_questions_per_batch(0), "questions_per_batch", 0),
            (QuizRequest::new("x").with_parallel(0), "max_workers", 0),
        ];
        for (request, field, value) in cases {
            assert_eq!(
                request.normalize(&config).unwrap_err(),
                ConfigError::NonPositive { field, value }
            );
        }
    }

    #[test]
    fn test_negative_top_k_is_rejected_but_zero_disables_retrieval() {
        let config = Config::default();
        assert!(QuizRequest::new("x").with_retrieval_top_k(-1).normalize(&config).is_err());
        let settings = QuizRequest::new("x").with_retrieval_top_k(0).normalize(&config).unwrap();
        assert_eq!(settings.retrieval_top_k, 0);
    }

    #[test]
    fn test_effective_workers_is_clamped() {
        let config = Config::default();
        let sequential = QuizRequest::new("x").normalize(&config).unwrap();
        assert_eq!(sequential.effective_workers(10, 8), 1);

        let parallel = QuizRequest::new("x").with_parallel(50).normalize(&config).unwrap();
        assert_eq!(parallel.effective_workers(3, 8), 3);
        assert_eq!(parallel.effective_workers(20, 8), 8);
    }
}
