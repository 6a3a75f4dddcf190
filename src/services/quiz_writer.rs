//! 测验写入服务 - 业务能力层
//!
//! 只负责"把测验写成 JSON 文件"能力，不关心流程

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use crate::models::Quiz;

/// 测验写入服务
///
/// 职责：
/// - 未指定输出路径时按 `quiz-<模块名>-<时间戳>.json` 命名
/// - 自动创建输出目录
pub struct QuizWriter {
    output_dir: PathBuf,
}

impl QuizWriter {
    /// 创建新的测验写入服务
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// 默认输出路径
    pub fn default_path(&self, module_name: &str, now: DateTime<Utc>) -> PathBuf {
        self.output_dir.join(file_name(module_name, now))
    }

    /// 写入测验，返回实际写入的路径
    pub async fn write(&self, quiz: &Quiz, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.default_path(&quiz.metadata.module_name, Utc::now()),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("无法创建输出目录: {}", parent.display()))?;
        }

        let json = quiz.to_pretty_json().context("无法序列化测验")?;
        debug!("写入测验: {} ({} 字节)", path.display(), json.len());

        fs::write(&path, json)
            .await
            .with_context(|| format!("无法写入测验文件: {}", path.display()))?;

        Ok(path)
    }
}

/// `quiz-<模块名>-<YYYYmmdd-HHMMSS>.json`，模块名小写、空白替换为下划线
pub fn file_name(module_name: &str, now: DateTime<Utc>) -> String {
    let safe: String = module_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("quiz-{}-{}.json", safe, now.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_is_lowercase_and_underscored() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            file_name("Intro to OS / Scheduling", now),
            "quiz-intro_to_os___scheduling-20240102-030405.json"
        );
    }

    #[test]
    fn test_default_path_is_under_output_dir() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let writer = QuizWriter::new("output/quizzes");
        assert_eq!(
            writer.default_path("Rust", now),
            PathBuf::from("output/quizzes/quiz-rust-20240102-030405.json")
        );
    }
}
