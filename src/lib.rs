//! # Module Quiz Gen
//!
//! 根据课程模块的 markdown 内容批量生成测验题目
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 外部能力的窄接口，只暴露能力
//! - `VectorStore` - 按课程检索支持段落
//! - `QuestionGenerator` - 根据上下文生成原始题目文本
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `Chunker` - 按标题切分模块内容
//! - `ContextRetriever` - 检索适配，失败降级为空上下文
//! - `Batcher` - 划分批次
//! - `validator` - 解析并归一化生成结果（兼容新旧字段）
//! - `LlmService` - 基于 async-openai 的生成能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个批次"的完整生成流程
//! - `BatchCtx` - 批次上下文
//! - `BatchFlow` - 生成 → 校验 → 重试
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/quiz_pipeline` - 一次请求的完整流水线
//! - `orchestrator/dispatcher` - 顺序 / 并行调度
//! - `orchestrator/aggregator` - 合并、去重、编号
//! - `orchestrator/assembler` - 组装测验文档
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{UnavailableVectorStore, VectorStoreClient};
pub use config::Config;
pub use error::{AppError, AppResult, ConfigError, GenerationError, RetrievalError, ValidationError};
pub use infrastructure::{PromptContext, QuestionGenerator, VectorStore};
pub use models::{Question, Quiz, QuizRequest};
pub use orchestrator::QuizPipeline;
pub use services::LlmService;
