//! 提示词构建 - 业务能力层
//!
//! 把一个批次的分块和检索段落渲染成 system / user 两条消息。

use std::fmt::Write as _;

use crate::infrastructure::PromptContext;

const SYSTEM_PROMPT: &str = "You are an assistant that writes multiple-choice quiz questions \
for course modules. Every question must be answerable from the provided module content. \
Respond with JSON only, no commentary.";

/// 提示词模板
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
    options_per_question: usize,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            options_per_question: 4,
        }
    }
}

impl PromptTemplate {
    pub fn system_message(&self) -> &str {
        &self.system
    }

    /// 构建用户消息
    ///
    /// 要求模型为每道题标注 `chunk_index`，校验器据此确定题目来源分块。
    pub fn user_message(&self, context: &PromptContext, target_count: usize) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Module: {}", context.module_name);
        let _ = writeln!(
            out,
            "Write exactly {} questions of type(s) {} covering the sections below.",
            target_count,
            context.question_types.join(", ")
        );
        let _ = writeln!(
            out,
            "Each question needs {} options labelled A-{}.\n",
            self.options_per_question,
            last_label(self.options_per_question)
        );

        for chunk in &context.chunks {
            let title = if chunk.header_path.is_empty() {
                "(untitled)".to_string()
            } else {
                chunk.header_path.join(" > ")
            };
            let _ = writeln!(out, "=== Section chunk_index={} | {} ===", chunk.chunk_index, title);
            let _ = writeln!(out, "{}\n", chunk.text);

            if !chunk.passages.is_empty() {
                let _ = writeln!(out, "Related material from the course knowledge base:");
                for passage in &chunk.passages {
                    let _ = writeln!(out, "- {}", passage.trim());
                }
                out.push('\n');
            }
        }

        out.push_str(
            r#"Return a JSON object of this shape:
{"questions": [{"type": "mcq", "question": "...", "options": {"A": "...", "B": "..."}, "correct_answer": "A", "explanation": "...", "topic": "...", "chunk_index": 0}]}
"chunk_index" must be the index of the section the question is drawn from."#,
        );

        out
    }
}

fn last_label(count: usize) -> char {
    char::from_u32('A' as u32 + count.clamp(1, 26) as u32 - 1).unwrap_or('D')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::PromptChunk;

    fn context() -> PromptContext {
        PromptContext {
            module_name: "Operating Systems".to_string(),
            batch_index: 1,
            chunks: vec![
                PromptChunk {
                    chunk_index: 2,
                    header_path: vec!["Scheduling".to_string(), "FIFO".to_string()],
                    text: "First in, first out.".to_string(),
                    passages: vec!["Queues serve the oldest job first.".to_string()],
                },
                PromptChunk {
                    chunk_index: 3,
                    header_path: vec![],
                    text: "Round robin uses time slices.".to_string(),
                    passages: vec![],
                },
            ],
            question_types: vec!["mcq".to_string()],
        }
    }

    #[test]
    fn test_user_message_lists_every_chunk_with_its_index() {
        let message = PromptTemplate::default().user_message(&context(), 6);

        assert!(message.contains("Write exactly 6 questions"));
        assert!(message.contains("chunk_index=2 | Scheduling > FIFO"));
        assert!(message.contains("chunk_index=3 | (untitled)"));
        assert!(message.contains("- Queues serve the oldest job first."));
        assert!(message.contains("labelled A-D"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let template = PromptTemplate::default();
        assert_eq!(
            template.user_message(&context(), 3),
            template.user_message(&context(), 3)
        );
    }
}
