/// 向量库 HTTP 客户端
///
/// 封装与课程知识库检索服务的 HTTP 调用
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::RetrievalError;
use crate::infrastructure::VectorStore;

/// 向量库客户端
///
/// `POST {base_url}/query`，请求体 `{course_id, query, top_k}`。
/// 404 / 503 视为向量库未就绪。
pub struct VectorStoreClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    course_id: Option<&'a str>,
    query: &'a str,
    top_k: usize,
}

/// 检索服务的两种响应格式
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    Passages { passages: Vec<String> },
    Documents { documents: Vec<Document> },
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(alias = "text", alias = "content")]
    page_content: String,
}

impl QueryResponse {
    fn into_passages(self) -> Vec<String> {
        match self {
            QueryResponse::Passages { passages } => passages,
            QueryResponse::Documents { documents } => {
                documents.into_iter().map(|d| d.page_content).collect()
            }
        }
    }
}

impl VectorStoreClient {
    /// 创建新的向量库客户端
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RetrievalError> {
        let endpoint = format!("{}/query", base_url.trim_end_matches('/'));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::request_failed(&endpoint, e))?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// 按配置创建，未配置检索服务地址时返回 None
    pub fn from_config(config: &Config) -> Result<Option<Self>, RetrievalError> {
        config
            .retriever_base_url
            .as_deref()
            .map(|url| Self::new(url, config.retrieval_timeout()))
            .transpose()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VectorStore for VectorStoreClient {
    async fn query(
        &self,
        course_id: Option<&str>,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let body = QueryRequest {
            course_id,
            query: text,
            top_k,
        };

        debug!("向量库检索: {} (top_k={})", self.endpoint, top_k);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RetrievalError::Timeout {
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    RetrievalError::request_failed(&self.endpoint, e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(RetrievalError::StoreNotReady {
                course_id: course_id.map(str::to_string),
            });
        }
        if !status.is_success() {
            return Err(RetrievalError::BadResponse {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::request_failed(&self.endpoint, e))?;

        Ok(payload.into_passages())
    }
}

/// 未配置检索服务时使用：所有查询都返回"未就绪"，生成在空上下文下继续
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableVectorStore;

#[async_trait]
impl VectorStore for UnavailableVectorStore {
    async fn query(
        &self,
        course_id: Option<&str>,
        _text: &str,
        _top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        Err(RetrievalError::StoreNotReady {
            course_id: course_id.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passages_response_is_parsed() {
        let payload: QueryResponse =
            serde_json::from_str(r#"{"passages": ["one", "two"]}"#).unwrap();
        assert_eq!(payload.into_passages(), vec!["one", "two"]);
    }

    #[test]
    fn test_documents_response_is_parsed() {
        let payload: QueryResponse = serde_json::from_str(
            r#"{"documents": [{"page_content": "alpha", "metadata": {}}, {"text": "beta"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.into_passages(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_request_body_omits_missing_course() {
        let body = QueryRequest {
            course_id: None,
            query: "ownership",
            top_k: 3,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"query": "ownership", "top_k": 3})
        );
    }

    #[test]
    fn test_endpoint_is_normalized() {
        let client = VectorStoreClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8000/query");
    }

    #[test]
    fn test_from_config_without_url_is_none() {
        assert!(VectorStoreClient::from_config(&Config::default())
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_reports_not_ready() {
        let err = UnavailableVectorStore
            .query(Some("CS101"), "anything", 3)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RetrievalError::StoreNotReady {
                course_id: Some("CS101".to_string())
            }
        );
    }
}
