use anyhow::{Context, Result};
use std::sync::mpsc as std_mpsc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::health;
use crate::session::runner::{run_interactive, run_until_finished, spawn_line_editor};
use crate::session::{connect, ClientSession, TaskOutcome, TerminalView};

/// 打印帮助信息
fn print_help() {
    println!("🤖 tutor - 流式问答客户端");
    println!();
    println!("用法：tutor [选项] <命令>");
    println!();
    println!("命令:");
    println!("  chat            进入交互模式（默认）");
    println!("  ask <问题>      提问一次，输出回答后退出");
    println!("  ping            检查服务端是否在线");
    println!("  onboard         初始化配置");
    println!("  help            显示此帮助信息");
    println!();
    println!("选项:");
    println!("  --url <地址>    本次运行使用的 WebSocket 地址");
    println!("  -v, --verbose   输出调试日志");
    println!();
    println!("交互模式命令:");
    println!("  /stop   - 停止当前任务");
    println!("  /status - 查询当前任务状态");
    println!("  /quit   - 退出");
    println!("  回答输出期间提示符暂停：Ctrl-C 停止生成，Ctrl-\\ 查询任务状态（Unix）");
    println!();
    println!("示例:");
    println!("  tutor                       # 开始对话");
    println!("  tutor ask 什么是所有权？    # 单次提问");
}

/// 命令行参数
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    command: Option<String>,
    rest: Vec<String>,
    url: Option<String>,
    verbose: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut iter = args.into_iter().skip(1);

    while let Some(arg) = iter.next() {
        if arg == "-v" || arg == "--verbose" {
            parsed.verbose = true;
        } else if arg == "--url" {
            let url = iter.next().context("--url 需要一个地址")?;
            parsed.url = Some(url);
        } else if let Some(url) = arg.strip_prefix("--url=") {
            parsed.url = Some(url.to_string());
        } else if parsed.command.is_none() {
            parsed.command = Some(arg.to_lowercase());
        } else {
            parsed.rest.push(arg);
        }
    }

    Ok(parsed)
}

/// 初始化日志，输出到 stderr，避免和回答混在一起
fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Onboard 命令 - 写入默认配置
fn run_onboard(config: &Config) -> Result<()> {
    println!("🚀 初始化 tutor 配置...\n");

    let path = Config::path();
    config.save(&path).context("保存配置文件失败")?;

    println!("✅ 保存配置：{}", path.display());
    println!("   服务端：{}", config.client.url);
    println!();
    println!("🎉 初始化完成！运行 'tutor' 开始对话");

    Ok(())
}

/// Ping 命令 - 检查服务端
async fn run_ping(config: &Config) -> Result<()> {
    let url = config.client.health_url()?;

    match health::ping(&config.client).await {
        Ok(status) if status.is_ok() => {
            println!("✅ 服务端在线：{}（{}）", url, status.message);
            Ok(())
        }
        Ok(status) => {
            eprintln!("⚠️ 服务端返回异常：code={} message={}", status.code, status.message);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Ask 命令 - 单次提问
async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let (sender, mut reader) = connect(&config.client).await?;
    let mut session = ClientSession::new(sender, TerminalView::new(config.display.show_status));

    session.send_question(question)?;
    let result = run_until_finished(&mut session, &mut reader).await;
    let outcome = session.state().last_outcome();

    if let Some(sender) = session.dispose() {
        sender.shutdown().await;
    }
    result?;

    if outcome == Some(TaskOutcome::Failed) {
        std::process::exit(1);
    }
    Ok(())
}

/// Chat 命令 - 交互式问答
async fn run_chat(config: &Config) -> Result<()> {
    println!("🤖 tutor - 流式问答客户端");
    println!("🔗 服务端：{}", config.client.url);
    println!("输入问题开始对话，/help 查看命令，/quit 退出\n");

    let (sender, mut reader) = connect(&config.client).await?;
    let mut session = ClientSession::new(sender, TerminalView::new(config.display.show_status));

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = std_mpsc::channel();
    let _editor = spawn_line_editor(input_tx, ready_rx);

    let result = run_interactive(&mut session, &mut reader, &mut input_rx, ready_tx).await;

    if let Some(sender) = session.dispose() {
        sender.shutdown().await;
    }
    println!("👋 再见！");

    result
}

/// 主入口函数
pub async fn run_cli() -> Result<()> {
    let args = parse_args(std::env::args())?;
    init_logging(args.verbose);

    let mut config = Config::load_default()?;
    if let Some(url) = args.url {
        config.client.url = url;
    }

    let command = args.command.as_deref().unwrap_or("chat");

    match command {
        "chat" | "c" => run_chat(&config).await,
        "ask" | "a" => {
            if args.rest.is_empty() {
                eprintln!("❌ 请输入问题");
                eprintln!("用法：tutor ask <问题>");
                std::process::exit(1);
            }
            run_ask(&config, &args.rest.join(" ")).await
        }
        "ping" | "p" => run_ping(&config).await,
        "onboard" => run_onboard(&config),
        "help" | "-h" | "--help" | "h" => {
            print_help();
            Ok(())
        }
        _ => {
            eprintln!("❌ 未知命令：{}", command);
            eprintln!();
            eprintln!("运行 'tutor help' 查看帮助信息");
            std::process::exit(1);
        }
    }
}
