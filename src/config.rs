//! 程序配置
//!
//! 进程级、不可变的配置：构造时注入一次（`Arc<Config>`），请求过程中不会被修改。

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 请求默认值（请求未提供时使用）---
    /// 每个分块检索的段落数量
    pub default_retrieval_top_k: usize,
    /// 每批分块数量
    pub default_batch_size: usize,
    /// 每批目标题目数量
    pub default_questions_per_batch: usize,
    /// 是否启用并行处理
    pub default_parallel_processing: bool,
    /// 并行模式下的默认并发数
    pub default_max_workers: usize,
    /// 并发数上限（无论请求如何设置）
    pub max_workers_ceiling: usize,

    // --- 切分 / 检索 ---
    /// 切分使用的最深标题级别（2 表示 `#` 和 `##`）
    pub chunk_split_depth: usize,
    /// 检索查询文本的最大字符数
    pub retrieval_query_max_chars: usize,
    /// 单次检索超时（秒）
    pub retrieval_timeout_secs: u64,
    /// 向量库服务地址（为空时不做检索）
    pub retriever_base_url: Option<String>,

    // --- 生成 / 重试 ---
    /// 单次生成调用超时（秒）
    pub generation_timeout_secs: u64,
    /// 整个请求的截止时间（秒），None 表示不限制
    pub request_deadline_secs: Option<u64>,
    /// 每个批次最多尝试次数（含首次）
    pub max_attempts: u32,
    /// 重试退避基数（毫秒），每次翻倍
    pub retry_backoff_base_ms: u64,
    /// 重试退避上限（毫秒）
    pub retry_backoff_max_ms: u64,
    /// 生成温度
    pub temperature: f32,
    /// 单次生成的最大 token 数
    pub max_tokens: u32,
    /// 期望的题目类型
    pub question_types: Vec<String>,

    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,

    // --- 输出 ---
    /// 题目 JSON 输出目录
    pub output_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_retrieval_top_k: 3,
            default_batch_size: 2,
            default_questions_per_batch: 3,
            default_parallel_processing: false,
            default_max_workers: 1,
            max_workers_ceiling: 8,
            chunk_split_depth: 2,
            retrieval_query_max_chars: 1000,
            retrieval_timeout_secs: 30,
            retriever_base_url: None,
            generation_timeout_secs: 3000,
            request_deadline_secs: None,
            max_attempts: 3,
            retry_backoff_base_ms: 2_000,
            retry_backoff_max_ms: 60_000,
            temperature: 0.3,
            max_tokens: 4096,
            question_types: vec!["mcq".to_string()],
            llm_api_key: "dummy".to_string(),
            llm_api_base_url: "http://localhost:8001/v1".to_string(),
            llm_model_name: "Qwen/Qwen2-1.5B-Instruct-GGUF".to_string(),
            output_dir: "output/quizzes".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            default_retrieval_top_k: env_or("QUIZ_RETRIEVAL_TOP_K", default.default_retrieval_top_k),
            default_batch_size: env_or("QUIZ_BATCH_SIZE", default.default_batch_size),
            default_questions_per_batch: env_or("QUIZ_QUESTIONS_PER_BATCH", default.default_questions_per_batch),
            default_parallel_processing: env_or("QUIZ_PARALLEL_PROCESSING", default.default_parallel_processing),
            default_max_workers: env_or("QUIZ_MAX_WORKERS", default.default_max_workers),
            max_workers_ceiling: env_or("QUIZ_MAX_WORKERS_CEILING", default.max_workers_ceiling),
            chunk_split_depth: env_or("QUIZ_CHUNK_SPLIT_DEPTH", default.chunk_split_depth),
            retrieval_query_max_chars: env_or("QUIZ_RETRIEVAL_QUERY_MAX_CHARS", default.retrieval_query_max_chars),
            retrieval_timeout_secs: env_or("RETRIEVAL_TIMEOUT_SECS", default.retrieval_timeout_secs),
            retriever_base_url: std::env::var("RETRIEVER_BASE_URL").ok().or(default.retriever_base_url),
            generation_timeout_secs: env_or("GENERATION_TIMEOUT_SECS", default.generation_timeout_secs),
            request_deadline_secs: std::env::var("QUIZ_REQUEST_DEADLINE_SECS").ok().and_then(|v| v.parse().ok()).or(default.request_deadline_secs),
            max_attempts: env_or("GENERATION_MAX_ATTEMPTS", default.max_attempts),
            retry_backoff_base_ms: env_or("RETRY_BACKOFF_BASE_MS", default.retry_backoff_base_ms),
            retry_backoff_max_ms: env_or("RETRY_BACKOFF_MAX_MS", default.retry_backoff_max_ms),
            temperature: env_or("QUIZ_TEMPERATURE", default.temperature),
            max_tokens: env_or("LLM_MAX_TOKENS", default.max_tokens),
            question_types: std::env::var("QUIZ_QUESTION_TYPES")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(default.question_types),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            output_dir: std::env::var("QUIZ_OUTPUT_DIR").unwrap_or(default.output_dir),
            verbose_logging: env_or("VERBOSE_LOGGING", default.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，未出现的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 校验进程级配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives: [(&'static str, u64); 5] = [
            ("max_workers_ceiling", self.max_workers_ceiling as u64),
            ("chunk_split_depth", self.chunk_split_depth as u64),
            ("max_attempts", self.max_attempts as u64),
            ("generation_timeout_secs", self.generation_timeout_secs),
            ("retrieval_timeout_secs", self.retrieval_timeout_secs),
        ];
        for (field, value) in positives {
            if value == 0 {
                return Err(ConfigError::non_positive(field, 0));
            }
        }
        Ok(())
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs)
    }

    pub fn request_deadline(&self) -> Option<Duration> {
        self.request_deadline_secs.map(Duration::from_secs)
    }

    /// 第 `attempt` 次失败后的退避时间（attempt 从 1 开始）
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let ms = self
            .retry_backoff_base_ms
            .saturating_mul(factor)
            .min(self.retry_backoff_max_ms);
        Duration::from_millis(ms)
    }
}

fn env_or<T: FromStr>(var_name: &str, default: T) -> T {
    std::env::var(var_name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.default_retrieval_top_k, 3);
        assert_eq!(config.default_batch_size, 2);
        assert_eq!(config.default_questions_per_batch, 3);
        assert!(!config.default_parallel_processing);
        assert_eq!(config.default_max_workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_backoff_doubles_and_caps() {
        let config = Config {
            retry_backoff_base_ms: 100,
            retry_backoff_max_ms: 350,
            ..Config::default()
        };
        assert_eq!(config.retry_backoff(1), Duration::from_millis(100));
        assert_eq!(config.retry_backoff(2), Duration::from_millis(200));
        assert_eq!(config.retry_backoff(3), Duration::from_millis(350));
        assert_eq!(config.retry_backoff(30), Duration::from_millis(350));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::non_positive("max_attempts", 0))
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("default_batch_size = 4\nverbose_logging = true\n").unwrap();
        assert_eq!(config.default_batch_size, 4);
        assert!(config.verbose_logging);
        assert_eq!(config.default_questions_per_batch, 3);
    }
}
