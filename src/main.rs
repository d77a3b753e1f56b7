use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskstore::{Application, ShutdownManager, TaskInvocation};
use taskstore_common::args_to_map;
use taskstore_config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "taskstore")]
#[command(version)]
#[command(about = "持久化多队列任务执行平台")]
struct Cli {
    /// 配置文件路径（TOML），缺省时使用默认配置与环境变量
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动队列运行器与调度计划运行器，直到 Ctrl-C
    Serve,
    /// 直接执行一个处理器；参数形如 --key=value 或 --flag
    Task {
        alias: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// 列出已注册的处理器
    List,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config)?;

    let app = Application::new(config).await?;

    match cli.command {
        Commands::Serve => {
            let manager = ShutdownManager::new();
            manager.listen_for_signals();
            app.run(manager.handle()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Task { alias, args } => {
            let success = execute_task(&app, &alias, &args).await;
            Ok(if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::List => {
            print_handlers(&app);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 按别名执行处理器；别名 list 保留用于枚举
async fn execute_task(app: &Application, alias: &str, args: &[String]) -> bool {
    if alias == "list" {
        print_handlers(app);
        return true;
    }

    let Some(handler) = app.registry().find(alias) else {
        eprintln!("未识别的任务别名: {alias}");
        return false;
    };

    let options = args_to_map(args);
    info!("执行任务: {alias}, 参数: {options:?}");

    let mut invocation = TaskInvocation::from_options(options);
    handler.handle(&mut invocation).await
}

fn print_handlers(app: &Application) {
    let handlers = app.registry().list();
    if handlers.is_empty() {
        println!("没有已注册的处理器");
        return;
    }
    for (index, handler) in handlers.iter().enumerate() {
        println!("{}. {}", index + 1, handler.alias());
        if !handler.title().is_empty() {
            println!("    - {}", handler.title());
        }
        if !handler.description().is_empty() {
            println!("    - {}", handler.description());
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("构建日志过滤器失败")?;

    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
