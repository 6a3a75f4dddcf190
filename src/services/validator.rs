//! 生成结果校验 - 业务能力层
//!
//! 把 LLM 返回的原始文本解析成规范题目：
//! - 兼容旧版平铺字段（`questionText` / `correctAnswer` / `["A) ..."]`）和当前结构化字段
//! - 单道题缺少 `options` 或 `correct_answer` 只丢弃该题
//! - 一道合格题目都没有时整个批次作废

use std::collections::BTreeMap;
use std::sync::LazyLock;

use phf::phf_map;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::ValidationError;
use crate::models::{Batch, CandidateQuestion};

/// 未给出类型时的题目类型
pub const DEFAULT_QUESTION_TYPE: &str = "mcq";

/// 规范字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Field {
    Stem,
    Type,
    Options,
    Answer,
    Explanation,
    Topic,
    ChunkIndex,
}

/// 字段别名表：原始键 → (规范字段, 优先级)，优先级小的先用（当前命名为 0，旧版为 1）
static FIELD_ALIASES: phf::Map<&'static str, (Field, u8)> = phf_map! {
    "question" => (Field::Stem, 0),
    "question_text" => (Field::Stem, 1),
    "questionText" => (Field::Stem, 1),
    "stem" => (Field::Stem, 1),
    "type" => (Field::Type, 0),
    "question_type" => (Field::Type, 1),
    "questionType" => (Field::Type, 1),
    "options" => (Field::Options, 0),
    "choices" => (Field::Options, 1),
    "correct_answer" => (Field::Answer, 0),
    "correctAnswer" => (Field::Answer, 1),
    "answer" => (Field::Answer, 1),
    "explanation" => (Field::Explanation, 0),
    "rationale" => (Field::Explanation, 1),
    "topic" => (Field::Topic, 0),
    "section" => (Field::Topic, 1),
    "chunk_index" => (Field::ChunkIndex, 0),
    "source_chunk_index" => (Field::ChunkIndex, 1),
    "chunkIndex" => (Field::ChunkIndex, 1),
};

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fence regex is valid")
});

/// 形如 `A) text`、`(b) text`、`C. text`、`D: text` 的选项标签
static OPTION_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(?([A-Za-z])[\)\.:]\s*(.*)$").expect("option label regex is valid")
});

/// 解析并校验一个批次的原始返回内容
pub fn validate_payload(
    raw_payload: &str,
    batch: &Batch,
) -> Result<Vec<CandidateQuestion>, ValidationError> {
    let json = extract_json(raw_payload)?;
    let entries = question_entries(&json)?;

    let mut accepted: Vec<(NormalizedFields, Option<usize>)> = Vec::new();
    let mut rejected = 0usize;

    for (i, entry) in entries.iter().enumerate() {
        match normalize_entry(entry) {
            Ok(fields) => {
                let hint = fields.chunk_hint.filter(|idx| batch.contains(*idx));
                accepted.push((fields, hint));
            }
            Err(reason) => {
                rejected += 1;
                debug!("[批次 {}] 丢弃第 {} 道题: {}", batch.batch_index, i + 1, reason);
            }
        }
    }

    if accepted.is_empty() {
        return Err(ValidationError::NoValidQuestions { rejected });
    }

    let total = accepted.len();
    let mut questions: Vec<CandidateQuestion> = accepted
        .into_iter()
        .enumerate()
        .map(|(position, (fields, hint))| {
            let source_chunk_index =
                hint.unwrap_or_else(|| spread_chunk(&batch.chunk_indices, position, total));
            fields.into_candidate(source_chunk_index)
        })
        .collect();

    // 稳定排序：同一分块内保持模型给出的顺序
    questions.sort_by_key(|q| q.source_chunk_index);

    Ok(questions)
}

/// 从原始文本中提取 JSON：支持 markdown 代码块和前后夹杂说明文字
pub fn extract_json(raw: &str) -> Result<JsonValue, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Unparseable {
            reason: "返回内容为空".to_string(),
        });
    }

    if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
        return Ok(value);
    }

    if let Some(inner) = FENCED_JSON_RE.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str::<JsonValue>(inner.as_str().trim()) {
            return Ok(value);
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<JsonValue>(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    Err(ValidationError::Unparseable {
        reason: format!("无法从返回内容中找到 JSON ({} 字符)", trimmed.chars().count()),
    })
}

fn question_entries(json: &JsonValue) -> Result<&Vec<JsonValue>, ValidationError> {
    match json {
        JsonValue::Array(entries) => Ok(entries),
        JsonValue::Object(map) => map
            .get("questions")
            .and_then(JsonValue::as_array)
            .ok_or(ValidationError::MissingQuestions),
        _ => Err(ValidationError::MissingQuestions),
    }
}

/// 单道题目归一化后的字段
#[derive(Debug)]
struct NormalizedFields {
    question_type: String,
    stem: String,
    options: BTreeMap<String, String>,
    correct_answer: String,
    explanation: String,
    topic: String,
    chunk_hint: Option<usize>,
}

impl NormalizedFields {
    fn into_candidate(self, source_chunk_index: usize) -> CandidateQuestion {
        CandidateQuestion {
            question_type: self.question_type,
            stem: self.stem,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
            topic: self.topic,
            source_chunk_index,
        }
    }
}

/// 按别名表收集字段
fn resolve_fields(entry: &Map<String, JsonValue>) -> BTreeMap<Field, &JsonValue> {
    let mut resolved: BTreeMap<Field, (u8, &JsonValue)> = BTreeMap::new();
    for (key, value) in entry {
        if value.is_null() {
            continue;
        }
        let Some(&(canonical, priority)) = FIELD_ALIASES.get(key.as_str()) else {
            continue;
        };
        match resolved.get(&canonical) {
            Some((existing, _)) if *existing <= priority => {}
            _ => {
                resolved.insert(canonical, (priority, value));
            }
        }
    }
    resolved.into_iter().map(|(k, (_, v))| (k, v)).collect()
}

fn field<'a>(fields: &BTreeMap<Field, &'a JsonValue>, f: Field) -> Option<&'a JsonValue> {
    fields.get(&f).copied()
}

fn normalize_entry(entry: &JsonValue) -> Result<NormalizedFields, String> {
    let map = entry.as_object().ok_or("题目不是 JSON 对象")?;
    let fields = resolve_fields(map);

    let stem = field(&fields, Field::Stem)
        .and_then(as_text)
        .filter(|s| !s.is_empty())
        .ok_or("缺少题干")?;

    let options = field(&fields, Field::Options)
        .map(parse_options)
        .unwrap_or_default();
    if options.len() < 2 {
        return Err(format!("选项不足 ({} 个)", options.len()));
    }

    let raw_answer = field(&fields, Field::Answer)
        .and_then(as_text)
        .filter(|s| !s.is_empty())
        .ok_or("缺少正确答案")?;
    let correct_answer = resolve_answer(&raw_answer, &options)
        .ok_or_else(|| format!("正确答案 '{}' 不在选项中", raw_answer))?;

    let question_type = field(&fields, Field::Type)
        .and_then(as_text)
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_QUESTION_TYPE.to_string());

    Ok(NormalizedFields {
        question_type,
        stem,
        options,
        correct_answer,
        explanation: field(&fields, Field::Explanation).and_then(as_text).unwrap_or_default(),
        topic: field(&fields, Field::Topic).and_then(as_text).unwrap_or_default(),
        chunk_hint: field(&fields, Field::ChunkIndex)
            .and_then(JsonValue::as_u64)
            .map(|i| i as usize),
    })
}

fn as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 解析选项：对象 `{"A": "..."}` 或列表 `["A) ...", ...]` / `[{"label": "A", "text": "..."}]`
fn parse_options(value: &JsonValue) -> BTreeMap<String, String> {
    let mut options = BTreeMap::new();

    match value {
        JsonValue::Object(map) => {
            for (key, text) in map {
                let label = normalize_label(key);
                if let (Some(label), Some(text)) = (label, as_text(text)) {
                    if !text.is_empty() {
                        options.entry(label).or_insert(text);
                    }
                }
            }
        }
        JsonValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let fallback = index_label(i);
                let parsed = match item {
                    JsonValue::Object(obj) => {
                        let label = ["label", "key", "id"]
                            .iter()
                            .find_map(|k| obj.get(*k).and_then(as_text))
                            .and_then(|l| normalize_label(&l));
                        let text = ["text", "value", "option"]
                            .iter()
                            .find_map(|k| obj.get(*k).and_then(as_text));
                        text.map(|t| (label.unwrap_or(fallback), t))
                    }
                    other => as_text(other).map(|text| split_labelled(&text, fallback)),
                };
                if let Some((label, text)) = parsed {
                    if !text.is_empty() {
                        options.entry(label).or_insert(text);
                    }
                }
            }
        }
        _ => {}
    }

    options
}

/// `"A) text"` → ("A", "text")；没有标签时使用按位置生成的标签
fn split_labelled(text: &str, fallback: String) -> (String, String) {
    match OPTION_LABEL_RE.captures(text) {
        Some(caps) => {
            let label = caps[1].to_uppercase();
            let body = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            (label, body.to_string())
        }
        None => (fallback, text.trim().to_string()),
    }
}

fn normalize_label(key: &str) -> Option<String> {
    let cleaned: String = key
        .trim()
        .trim_matches(|c: char| c == '(' || c == ')' || c == '.' || c == ':')
        .to_uppercase();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn index_label(i: usize) -> String {
    char::from_u32('A' as u32 + (i % 26) as u32)
        .map(String::from)
        .unwrap_or_else(|| (i + 1).to_string())
}

/// 把答案归一化为选项标签：`"c"`、`"C) FIFO"`、`"FIFO"` 都会得到 `"C"`
fn resolve_answer(raw: &str, options: &BTreeMap<String, String>) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    if options.contains_key(&upper) {
        return Some(upper);
    }

    if let Some(caps) = OPTION_LABEL_RE.captures(raw) {
        let label = caps[1].to_uppercase();
        if options.contains_key(&label) {
            return Some(label);
        }
    }

    let wanted = raw.trim().to_lowercase();
    options
        .iter()
        .find(|(_, text)| text.trim().to_lowercase() == wanted)
        .map(|(label, _)| label.clone())
}

/// 没有分块提示时，按位置把题目均匀分配到批次内的分块
fn spread_chunk(chunk_indices: &[usize], position: usize, total: usize) -> usize {
    if chunk_indices.is_empty() || total == 0 {
        return 0;
    }
    let slot = (position * chunk_indices.len() / total).min(chunk_indices.len() - 1);
    chunk_indices[slot]
}
