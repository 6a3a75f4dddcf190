//! 错误类型
//!
//! 只有 [`AppError::Config`] 和 [`AppError::TotalGenerationFailure`] 会传播给调用方，
//! 其余错误（检索 / 生成 / 校验）都在批次内部被吸收，只体现在更少的题目数量上。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（在任何切分 / 检索 / 生成之前被拒绝）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 所有批次都失败
    #[error("题目生成全部失败: {failed_batches} 个批次均未产出有效题目 (最后错误: {last_error})")]
    TotalGenerationFailure {
        failed_batches: usize,
        last_error: String,
    },
}

/// 配置错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 数值参数必须为正整数
    #[error("参数 {field} 必须为正整数，实际值: {value}")]
    NonPositive { field: &'static str, value: i64 },

    /// 数值参数不能为负数
    #[error("参数 {field} 不能为负数，实际值: {value}")]
    Negative { field: &'static str, value: i64 },

    /// 模块内容为空
    #[error("模块内容不能为空")]
    EmptyModuleContent,

    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 配置文件读取或解析失败
    #[error("配置文件 {path} 无效: {message}")]
    InvalidFile { path: String, message: String },
}

/// 检索错误（非致命，降级为空上下文）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// 向量库未就绪（不存在 / 未初始化）
    #[error("向量库未就绪 (课程: {})", .course_id.as_deref().unwrap_or("默认"))]
    StoreNotReady { course_id: Option<String> },

    /// 检索超时
    #[error("检索超时 ({secs} 秒)")]
    Timeout { secs: u64 },

    /// 网络请求失败
    #[error("检索请求失败 ({endpoint}): {message}")]
    RequestFailed { endpoint: String, message: String },

    /// 返回了无法识别的响应
    #[error("检索返回错误响应 ({endpoint}): status={status}")]
    BadResponse { endpoint: String, status: u16 },
}

/// 生成错误（按批次重试，耗尽后该批次标记为失败）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },

    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },

    /// 单次调用超时
    #[error("生成调用超时 ({secs} 秒)")]
    Timeout { secs: u64 },

    /// 请求级截止时间已到，批次被放弃
    #[error("请求截止时间已到，批次被放弃")]
    DeadlineElapsed,

    /// 工作任务异常退出
    #[error("工作任务异常退出: {0}")]
    WorkerPanicked(String),

    /// 返回内容未通过校验
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// 校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 无法从返回内容中解析出 JSON
    #[error("无法解析生成结果: {reason}")]
    Unparseable { reason: String },

    /// JSON 中没有题目列表
    #[error("生成结果中没有题目列表")]
    MissingQuestions,

    /// 没有任何一道合格的题目
    #[error("生成结果中没有合格题目 (丢弃 {rejected} 道)")]
    NoValidQuestions { rejected: usize },
}

// ========== 便捷构造函数 ==========

impl ConfigError {
    /// 创建正整数校验错误
    pub fn non_positive(field: &'static str, value: i64) -> Self {
        ConfigError::NonPositive { field, value }
    }
}

impl GenerationError {
    /// 创建 LLM API 调用错误
    pub fn api_call_failed(model: impl Into<String>, source: impl std::fmt::Display) -> Self {
        GenerationError::ApiCallFailed {
            model: model.into(),
            message: source.to_string(),
        }
    }
}

impl RetrievalError {
    /// 创建检索请求失败错误
    pub fn request_failed(endpoint: impl Into<String>, source: impl std::fmt::Display) -> Self {
        RetrievalError::RequestFailed {
            endpoint: endpoint.into(),
            message: source.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts_into_app_error() {
        let err: AppError = ConfigError::non_positive("batch_size", 0).into();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::NonPositive {
                field: "batch_size",
                value: 0
            })
        ));
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_store_not_ready_is_distinguishable() {
        let err = RetrievalError::StoreNotReady {
            course_id: Some("CS101".to_string()),
        };
        assert!(matches!(err, RetrievalError::StoreNotReady { .. }));
        assert!(err.to_string().contains("CS101"));
    }

    #[test]
    fn test_validation_error_is_transparent_inside_generation_error() {
        let err: GenerationError = ValidationError::MissingQuestions.into();
        assert_eq!(err.to_string(), ValidationError::MissingQuestions.to_string());
    }
}
