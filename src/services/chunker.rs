//! 模块内容切分器 - 业务能力层
//!
//! 按 markdown 标题边界切分，避免在一段论述中间截断。相同输入总是得到相同的分块。

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Chunk;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.*?)(?:[ \t]+#+)?[ \t]*$").expect("header regex is valid")
});

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(```|~~~)").expect("fence regex is valid"));

/// 内容切分器
pub struct Chunker {
    /// 参与切分的最深标题级别
    split_depth: usize,
}

/// 切分过程中的一个标题段落
struct Section<'a> {
    header_path: Vec<String>,
    lines: Vec<&'a str>,
    has_body: bool,
    has_header: bool,
}

impl<'a> Section<'a> {
    fn preamble() -> Self {
        Self {
            header_path: Vec::new(),
            lines: Vec::new(),
            has_body: false,
            has_header: false,
        }
    }
}

impl Chunker {
    pub fn new(split_depth: usize) -> Self {
        Self {
            split_depth: split_depth.clamp(1, 6),
        }
    }

    /// 切分 markdown 内容
    ///
    /// - 没有标题时整篇内容为一个分块
    /// - 只有标题没有正文的段落会并入下一个分块
    /// - 代码块内的 `#` 行不视为标题
    pub fn split(&self, content: &str) -> Vec<Chunk> {
        let sections = self.collect_sections(content);

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        let mut pending_path: Vec<String> = Vec::new();

        for section in sections {
            if !section.has_body {
                if section.has_header {
                    pending.extend(section.lines);
                    pending_path = section.header_path;
                }
                continue;
            }

            let mut lines = std::mem::take(&mut pending);
            lines.extend(section.lines);
            pending_path.clear();

            chunks.push(Chunk::new(chunks.len(), join_lines(&lines), section.header_path));
        }

        // 末尾只有标题的段落
        if !pending.is_empty() {
            match chunks.last_mut() {
                Some(last) => {
                    last.text.push('\n');
                    last.text.push_str(&join_lines(&pending));
                }
                None => chunks.push(Chunk::new(0, join_lines(&pending), pending_path)),
            }
        }

        chunks
    }

    fn collect_sections<'a>(&self, content: &'a str) -> Vec<Section<'a>> {
        let mut sections = Vec::new();
        let mut stack: Vec<(usize, String)> = Vec::new();
        let mut current = Section::preamble();
        let mut in_fence = false;

        for line in content.lines() {
            if FENCE_RE.is_match(line) {
                in_fence = !in_fence;
                current.lines.push(line);
                current.has_body = true;
                continue;
            }

            if !in_fence {
                if let Some((level, title)) = self.parse_header(line) {
                    sections.push(std::mem::replace(&mut current, Section::preamble()));

                    while stack.last().is_some_and(|(l, _)| *l >= level) {
                        stack.pop();
                    }
                    stack.push((level, title));

                    current = Section {
                        header_path: stack.iter().map(|(_, t)| t.clone()).collect(),
                        lines: vec![line],
                        has_body: false,
                        has_header: true,
                    };
                    continue;
                }
            }

            if !line.trim().is_empty() {
                current.has_body = true;
            }
            current.lines.push(line);
        }

        sections.push(current);
        sections
    }

    /// 解析参与切分的标题行，返回 (级别, 标题)
    fn parse_header(&self, line: &str) -> Option<(usize, String)> {
        let caps = HEADER_RE.captures(line)?;
        let level = caps.get(1)?.as_str().len();
        if level > self.split_depth {
            return None;
        }
        let title = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        Some((level, title.to_string()))
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(2)
    }
}

fn join_lines(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}
