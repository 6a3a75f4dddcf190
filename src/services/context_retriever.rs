//! 检索适配 - 业务能力层
//!
//! 为每个分块检索支持段落。检索失败、超时、向量库未就绪都只降级为空上下文，
//! 不会让整个请求失败。

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::RetrievalError;
use crate::infrastructure::VectorStore;
use crate::models::{Chunk, ContextBundle};
use crate::utils::logging::truncate_text;

/// 分块上下文检索
pub struct ContextRetriever {
    store: Arc<dyn VectorStore>,
    timeout: Duration,
    query_max_chars: usize,
}

impl ContextRetriever {
    pub fn new(store: Arc<dyn VectorStore>, config: &Config) -> Self {
        Self {
            store,
            timeout: config.retrieval_timeout(),
            query_max_chars: config.retrieval_query_max_chars,
        }
    }

    /// 检索单个分块的上下文，任何错误都返回空段落
    pub async fn retrieve(
        &self,
        course_id: Option<&str>,
        chunk: &Chunk,
        top_k: usize,
    ) -> ContextBundle {
        if top_k == 0 {
            return ContextBundle::empty(chunk.index);
        }

        let query: String = chunk.text.chars().take(self.query_max_chars).collect();

        let result = match tokio::time::timeout(
            self.timeout,
            self.store.query(course_id, &query, top_k),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        };

        match result {
            Ok(mut passages) => {
                passages.truncate(top_k);
                debug!(
                    "[分块 {}] 检索到 {} 个段落: {}",
                    chunk.index,
                    passages.len(),
                    truncate_text(&query, 40)
                );
                ContextBundle::new(chunk.index, passages)
            }
            Err(RetrievalError::StoreNotReady { .. }) => {
                warn!(
                    "[分块 {} {}] ⚠️ 向量库未就绪，使用空上下文继续",
                    chunk.index,
                    chunk.title().unwrap_or("前言")
                );
                ContextBundle::empty(chunk.index)
            }
            Err(e) => {
                warn!(
                    "[分块 {} {}] ⚠️ 检索失败，使用空上下文继续: {}",
                    chunk.index,
                    chunk.title().unwrap_or("前言"),
                    e
                );
                ContextBundle::empty(chunk.index)
            }
        }
    }

    /// 按分块顺序检索全部上下文，最多 `concurrency` 个检索同时进行
    pub async fn retrieve_all(
        &self,
        course_id: Option<&str>,
        chunks: &[Chunk],
        top_k: usize,
        concurrency: usize,
    ) -> Vec<ContextBundle> {
        stream::iter(chunks)
            .map(|chunk| self.retrieve(course_id, chunk, top_k))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
