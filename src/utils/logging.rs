/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::models::{GenerationOutcome, Quiz, QuizSettings};
use crate::workflow::BatchCtx;

/// 初始化日志
///
/// `RUST_LOG` 优先；未设置时默认 info，`verbose` 为 true 时为 debug
pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,module_quiz_gen={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录请求开始信息
pub fn log_startup(settings: &QuizSettings, chunks: usize, batches: usize, workers: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始生成测验: {}", settings.module_name);
    if let Some(course_id) = &settings.course_id {
        info!("📚 课程: {}", course_id);
    }
    info!(
        "📄 分块 {} 个 → 批次 {} 个 (每批 {} 个分块, {} 道题)",
        chunks,
        batches,
        settings.batch_size,
        settings.questions_per_batch
    );
    if settings.parallel_processing {
        info!("📊 并行模式，最大并发数: {}", workers);
    } else {
        info!("📊 顺序模式");
    }
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
pub fn log_batch_start(ctx: &BatchCtx) {
    info!("\n{}", "─".repeat(60));
    info!("{} 📦 开始处理 ({} 个分块)", ctx, ctx.batch.size());
}

/// 记录批次完成信息
pub fn log_batch_complete(ctx: &BatchCtx, outcome: &GenerationOutcome) {
    match outcome.error() {
        None => info!("{} ✓ 批次完成 (尝试 {} 次)", ctx, outcome.attempts),
        Some(e) => error!("{} ❌ 批次失败: {}", ctx, e),
    }
}

/// 打印最终统计信息
pub fn print_final_stats(quiz: &Quiz, elapsed: Duration) {
    let meta = &quiz.metadata;
    info!("\n{}", "=".repeat(60));
    info!("📊 测验生成完成统计");
    info!("完成时间: {}", meta.generated_at);
    info!("耗时: {:.1} 秒", elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    info!("✅ 题目: {} 道 (去重 {} 道)", meta.total_questions, meta.duplicates_removed);
    info!(
        "📦 批次: 成功 {}/{}",
        meta.batches_succeeded, meta.batches_total
    );
    info!("📄 分块: {}/{} 个产出题目", meta.chunks_processed, meta.chunks_total);
    if !meta.failed_batches.is_empty() {
        info!("❌ 失败批次: {:?}", meta.failed_batches);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("模块内容切分", 4), "模块内容...");
        assert_eq!(truncate_text("short", 10), "short");
    }
}
