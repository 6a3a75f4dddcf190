use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 最终题目
///
/// 序列化字段名与对外接口一致：`type` / `question` / `chunk_index`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// 题目编号，在整份测验内唯一，按最终顺序从 1 开始分配
    pub id: u32,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(rename = "question")]
    pub stem: String,
    /// 选项标签 → 选项内容（BTreeMap 保证输出顺序稳定）
    pub options: BTreeMap<String, String>,
    /// 正确选项的标签
    pub correct_answer: String,
    pub explanation: String,
    pub topic: String,
    #[serde(rename = "chunk_index")]
    pub source_chunk_index: usize,
}

/// 校验通过、尚未编号的题目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuestion {
    pub question_type: String,
    pub stem: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub explanation: String,
    pub topic: String,
    pub source_chunk_index: usize,
}

impl CandidateQuestion {
    /// 去重用的规范化题干：小写 + 合并空白
    pub fn normalized_stem(&self) -> String {
        normalize_stem(&self.stem)
    }

    pub fn into_question(self, id: u32) -> Question {
        Question {
            id,
            question_type: self.question_type,
            stem: self.stem,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
            topic: self.topic,
            source_chunk_index: self.source_chunk_index,
        }
    }
}

/// 规范化题干
pub fn normalize_stem(stem: &str) -> String {
    stem.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 截断题干以便显示（最多80个字符）
        let preview = if self.stem.chars().count() > 80 {
            self.stem.chars().take(80).collect::<String>() + "..."
        } else {
            self.stem.clone()
        };
        write!(f, "#{} [{}] {}", self.id, self.question_type, preview)
    }
}
