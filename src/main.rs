use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use module_quiz_gen::clients::{UnavailableVectorStore, VectorStoreClient};
use module_quiz_gen::models::load_quiz_request;
use module_quiz_gen::services::{LlmService, QuizWriter};
use module_quiz_gen::utils::logging::init_logger;
use module_quiz_gen::{Config, QuizPipeline, VectorStore};
use tracing::{info, warn};

const USAGE: &str = "用法: module_quiz_gen <module.md|request.toml> [output.json]";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args.next().map(PathBuf::from).context(USAGE)?;
    let output = args.next().map(PathBuf::from);

    // 加载配置：QUIZ_CONFIG 指向 TOML 文件时使用文件，否则读取环境变量
    let config = load_config()?;
    init_logger(config.verbose_logging);

    let store: Arc<dyn VectorStore> = match VectorStoreClient::from_config(&config)? {
        Some(client) => {
            info!("🔗 检索服务: {}", client.endpoint());
            Arc::new(client)
        }
        None => {
            warn!("⚠️ 未配置 RETRIEVER_BASE_URL，将在无检索上下文的情况下生成");
            Arc::new(UnavailableVectorStore)
        }
    };
    let generator = Arc::new(LlmService::new(&config));
    let writer = QuizWriter::new(&config.output_dir);

    let request = load_quiz_request(&input).await?;
    let pipeline = QuizPipeline::new(Arc::new(config), store, generator);
    let quiz = pipeline.generate(request).await?;

    let path = writer.write(&quiz, output.as_deref()).await?;
    print_summary(&quiz.metadata.module_name, quiz.questions.len(), &path);

    Ok(())
}

fn load_config() -> Result<Config> {
    let config = match std::env::var("QUIZ_CONFIG") {
        Ok(path) => Config::from_toml_file(Path::new(&path))?,
        Err(_) => Config::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn print_summary(module_name: &str, total: usize, path: &Path) {
    println!("{}", "=".repeat(60));
    println!("✅ 测验生成成功");
    println!("{}", "-".repeat(60));
    println!("  模块:     {}", module_name);
    println!("  题目数量: {}", total);
    println!("  输出文件: {}", path.display());
    println!("{}", "=".repeat(60));
}
