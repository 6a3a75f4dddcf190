//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把一次请求拆成批次、调度执行并合并结果，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `quiz_pipeline` - 流水线入口
//! - 归一化请求、切分、检索、分批
//! - 组装每个批次的生成输入
//! - 输出全局统计信息
//!
//! ### `dispatcher` - 批次调度器
//! - 顺序或并行（Semaphore）执行批次
//! - 请求级截止时间
//! - 每个批次只写自己的结果槽
//!
//! ### `aggregator` / `assembler`
//! - 所有批次结束后统一合并、去重、编号
//! - 填写测验元数据
//!
//! ## 层次关系
//!
//! ```text
//! quiz_pipeline (处理一次请求)
//!     ↓
//! dispatcher (处理 Vec<Batch>)
//!     ↓
//! workflow::BatchFlow (处理单个 Batch)
//!     ↓
//! services (能力层：chunker / retriever / validator / llm)
//!     ↓
//! infrastructure (外部能力：VectorStore / QuestionGenerator)
//! ```

pub mod aggregator;
pub mod assembler;
pub mod dispatcher;
pub mod quiz_pipeline;

// 重新导出主要类型
pub use aggregator::{aggregate, Aggregation};
pub use assembler::{Clock, QuizAssembler};
pub use dispatcher::{DispatchMode, Dispatcher};
pub use quiz_pipeline::QuizPipeline;
