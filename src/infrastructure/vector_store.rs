//! 向量库检索能力 - 基础设施层
//!
//! 只暴露"按文本检索 top-k 段落"的能力，不关心分块 / 批次。

use async_trait::async_trait;

use crate::error::RetrievalError;

/// 向量库检索能力
///
/// 实现方必须自行限制单次调用时长；向量库不存在或未初始化时返回
/// [`RetrievalError::StoreNotReady`]，而不是笼统的错误。
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 检索与 `text` 最相关的 `top_k` 个段落，按相关度排序
    ///
    /// `course_id` 用于选择课程专属的向量库，None 表示默认库。
    async fn query(
        &self,
        course_id: Option<&str>,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError>;
}
