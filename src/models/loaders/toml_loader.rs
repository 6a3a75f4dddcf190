use crate::models::request::QuizRequest;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载测验生成请求
///
/// TOML 中的 `module_path` 指向的 markdown 会作为模块内容（相对路径相对于 TOML 文件所在目录），
/// 直接写在 TOML 中的 `module_content` 优先。
pub async fn load_toml_to_quiz_request(toml_file_path: &Path) -> Result<QuizRequest> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let file: RequestFile = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    let mut request = file.request;
    let has_inline_content = request
        .module_content
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());

    if let (false, Some(module_path)) = (has_inline_content, file.module_path) {
        let base = toml_file_path.parent().unwrap_or_else(|| Path::new("."));
        let markdown_path = base.join(module_path);
        let markdown = fs::read_to_string(&markdown_path)
            .await
            .with_context(|| format!("无法读取模块文件: {}", markdown_path.display()))?;
        request.module_content = Some(markdown);
    }

    Ok(request)
}

/// 从 markdown 文件加载模块内容，其余参数使用默认值
pub async fn load_markdown_to_quiz_request(markdown_path: &Path) -> Result<QuizRequest> {
    let markdown = fs::read_to_string(markdown_path)
        .await
        .with_context(|| format!("无法读取模块文件: {}", markdown_path.display()))?;

    tracing::info!(
        "已加载模块: {} ({} 字符)",
        markdown_path.display(),
        markdown.chars().count()
    );

    Ok(QuizRequest::new(markdown))
}

/// 按扩展名加载请求：`.toml` 为请求文件，其余视为 markdown 模块
pub async fn load_quiz_request(path: &Path) -> Result<QuizRequest> {
    if !path.exists() {
        anyhow::bail!("文件不存在: {}", path.display());
    }

    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => load_toml_to_quiz_request(path).await,
        _ => load_markdown_to_quiz_request(path).await,
    }
}

#[derive(Debug, serde::Deserialize)]
struct RequestFile {
    #[serde(default)]
    module_path: Option<String>,
    #[serde(flatten)]
    request: QuizRequest,
}
