use anyhow::Result;
use reedline::{DefaultCompleter, DefaultHinter, DefaultPrompt, Reedline, Signal};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{error, warn};

use super::client::{ClientSession, Transport};
use super::connection::WsReader;
use super::view::View;

/// 行编辑器产生的用户输入
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Question(String),
    Stop,
    Status,
    Quit,
}

/// 解析一行输入，返回 None 表示忽略
pub fn parse_input(line: &str) -> Option<Input> {
    let input = line.trim();

    if input.is_empty() {
        return None;
    }

    if input.starts_with('/') {
        let cmd = input.split_whitespace().next().unwrap_or_default().to_lowercase();
        return match cmd.as_str() {
            "/quit" | "/exit" => Some(Input::Quit),
            "/stop" => Some(Input::Stop),
            "/status" => Some(Input::Status),
            "/help" | "/h" => {
                print_interactive_help();
                None
            }
            _ => {
                println!("❌ 未知命令：{}", input);
                println!("输入 /help 查看帮助\n");
                None
            }
        };
    }

    Some(Input::Question(input.to_string()))
}

pub fn print_interactive_help() {
    println!("命令:");
    println!("  /stop   - 停止当前任务");
    println!("  /status - 查询当前任务状态");
    println!("  /quit   - 退出");
    println!();
    println!("回答输出期间提示符暂停:");
    println!("  Ctrl-C  - 停止生成");
    #[cfg(unix)]
    println!("  Ctrl-\\  - 查询任务状态");
    println!();
}

/// 执行一条用户输入，返回 false 表示退出
pub fn apply_input<T: Transport, V: View>(
    session: &mut ClientSession<T, V>,
    input: Input,
) -> Result<bool> {
    match input {
        Input::Question(question) => session.send_question(&question)?,
        Input::Stop => session.stop_generation()?,
        Input::Status => session.check_status()?,
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

/// 生成期间查询状态的信号，Ctrl-\ 产生 SIGQUIT
struct StatusSignal {
    #[cfg(unix)]
    inner: Option<tokio::signal::unix::Signal>,
}

impl StatusSignal {
    #[cfg(unix)]
    fn new() -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        let inner = match signal(SignalKind::quit()) {
            Ok(signal) => Some(signal),
            Err(e) => {
                warn!(error = %e, "监听 SIGQUIT 失败");
                None
            }
        };
        StatusSignal { inner }
    }

    #[cfg(not(unix))]
    fn new() -> Self {
        StatusSignal {}
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            if let Some(signal) = self.inner.as_mut() {
                if signal.recv().await.is_some() {
                    return;
                }
                self.inner = None;
            }
        }
        std::future::pending::<()>().await
    }
}

/// 在独立线程中运行 reedline
///
/// 提交问题后暂停提示符，直到 `ready` 收到信号（回答结束），避免流式输出
/// 和提示符混在一起。暂停期间由 `run_interactive` 处理 Ctrl-C / Ctrl-\。
pub fn spawn_line_editor(
    inputs: mpsc::UnboundedSender<Input>,
    ready: std_mpsc::Receiver<()>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let prompt = DefaultPrompt::default();
        let mut line_editor = Reedline::create()
            .with_hinter(Box::new(DefaultHinter::default()))
            .with_completer(Box::new(DefaultCompleter::default()));

        loop {
            let sig = match line_editor.read_line(&prompt) {
                Ok(sig) => sig,
                Err(e) => {
                    error!(error = %e, "读取输入失败");
                    let _ = inputs.send(Input::Quit);
                    break;
                }
            };

            let input = match sig {
                Signal::Success(buffer) => match parse_input(&buffer) {
                    Some(input) => input,
                    None => continue,
                },
                Signal::CtrlC => Input::Stop,
                Signal::CtrlD => Input::Quit,
            };

            let waits = matches!(input, Input::Question(_));
            let quit = input == Input::Quit;

            if inputs.send(input).is_err() || quit {
                break;
            }

            if waits && ready.recv().is_err() {
                break;
            }
        }
    })
}

/// 提示符暂停期间的状态
#[derive(Debug, Default)]
struct Pause {
    awaiting_answer: bool,
    /// 任务 ID 到达前按下了 Ctrl-C，ID 一到就发送 stop
    stop_pending: bool,
}

impl Pause {
    fn question_sent(&mut self) {
        self.awaiting_answer = true;
        self.stop_pending = false;
    }

    /// 每处理完一帧调用，返回 true 表示回答结束、恢复提示符
    fn after_frame<T: Transport, V: View>(&mut self, session: &mut ClientSession<T, V>) -> Result<bool> {
        if self.stop_pending && session.state().active_task_id().is_some() {
            self.stop_pending = false;
            session.stop_generation()?;
        }
        if session.state().is_finished() {
            self.stop_pending = false;
            return Ok(std::mem::take(&mut self.awaiting_answer));
        }
        Ok(false)
    }

    /// Ctrl-C，返回 true 表示放弃等待、恢复提示符
    fn interrupt<T: Transport, V: View>(&mut self, session: &mut ClientSession<T, V>) -> Result<bool> {
        if session.state().active_task_id().is_some() {
            session.stop_generation()?;
            return Ok(false);
        }
        if !self.awaiting_answer {
            return Ok(false);
        }
        if !self.stop_pending {
            self.stop_pending = true;
            println!("⏳ 任务尚未开始，开始后将自动停止（再按 Ctrl-C 放弃等待）");
            return Ok(false);
        }
        // 放弃等待，任务若稍后开始仍会被停止
        self.awaiting_answer = false;
        Ok(true)
    }
}

/// 交互模式主循环：同时处理服务端消息、用户输入、Ctrl-C 和 Ctrl-\
pub async fn run_interactive<T: Transport, V: View>(
    session: &mut ClientSession<T, V>,
    reader: &mut WsReader,
    inputs: &mut mpsc::UnboundedReceiver<Input>,
    ready: std_mpsc::Sender<()>,
) -> Result<()> {
    let mut status_signal = StatusSignal::new();
    let mut pause = Pause::default();

    loop {
        tokio::select! {
            frame = reader.next_text() => match frame {
                Some(Ok(text)) => {
                    if let Err(e) = session.handle_frame(&text) {
                        warn!(error = %e, "处理服务器消息失败");
                    }
                    if pause.after_frame(session)? {
                        let _ = ready.send(());
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "连接异常");
                    session.handle_close()?;
                    break;
                }
                None => {
                    session.handle_close()?;
                    break;
                }
            },
            input = inputs.recv() => {
                let Some(input) = input else { break };
                if let Input::Question(_) = input {
                    pause.question_sent();
                }
                if !apply_input(session, input)? {
                    break;
                }
            },
            _ = status_signal.recv() => session.check_status()?,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "监听 Ctrl-C 失败");
                    continue;
                }
                if pause.interrupt(session)? {
                    println!();
                    let _ = ready.send(());
                }
            }
        }
    }

    Ok(())
}

/// 单次问答：读取消息直到任务结束或连接关闭，Ctrl-C 请求停止，Ctrl-\ 查询状态
pub async fn run_until_finished<T: Transport, V: View>(
    session: &mut ClientSession<T, V>,
    reader: &mut WsReader,
) -> Result<()> {
    let mut status_signal = StatusSignal::new();

    loop {
        tokio::select! {
            frame = reader.next_text() => match frame {
                Some(Ok(text)) => {
                    if let Err(e) = session.handle_frame(&text) {
                        warn!(error = %e, "处理服务器消息失败");
                    }
                    if session.state().is_finished() {
                        return Ok(());
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "连接异常");
                    return session.handle_close();
                }
                None => return session.handle_close(),
            },
            _ = status_signal.recv() => session.check_status()?,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "监听 Ctrl-C 失败");
                    continue;
                }
                if session.state().active_task_id().is_some() {
                    session.stop_generation()?;
                } else {
                    return Ok(());
                }
            }
        }
    }
}
