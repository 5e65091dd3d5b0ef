use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, Write};

use super::effects::Notice;
use super::state::TaskOutcome;

/// 预编译正则表达式（OSC 序列，例如修改终端标题）
static OSC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\][^\x07\x1b]*(\x07|\x1b\\)?").unwrap());

/// 预编译正则表达式（CSI 序列，颜色、光标移动等）
static CSI_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").unwrap());

/// 预编译正则表达式（其余控制字符，保留 \t 和 \n）
static CONTROL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B-\x1F\x7F]").unwrap());

/// 生成期间显示的停止提示
#[cfg(unix)]
pub const STOP_HINT: &str = "⏹  按 Ctrl-C 停止生成，Ctrl-\\ 查询任务状态";
#[cfg(not(unix))]
pub const STOP_HINT: &str = "⏹  按 Ctrl-C 停止生成";

/// 把服务端文本当作纯文本输出到终端前，去掉控制序列
pub fn sanitize_for_terminal(text: &str) -> String {
    let result = OSC_REGEX.replace_all(text, "");
    let result = CSI_REGEX.replace_all(&result, "");
    CONTROL_REGEX.replace_all(&result, "").into_owned()
}

/// 回复区域和停止按钮
pub trait View {
    /// 清空回复区域
    fn clear(&mut self);

    /// 追加文本
    fn append(&mut self, text: &str);

    /// 显示/隐藏停止按钮
    fn set_stop_visible(&mut self, visible: bool);

    fn notice(&mut self, _notice: &Notice) {}
}

/// 内存中的回复区域
#[derive(Debug, Default, Clone)]
pub struct TranscriptView {
    buffer: String,
    stop_visible: bool,
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn stop_visible(&self) -> bool {
        self.stop_visible
    }
}

impl View for TranscriptView {
    fn clear(&mut self) {
        self.buffer.clear();
    }

    fn append(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    fn set_stop_visible(&mut self, visible: bool) {
        self.stop_visible = visible;
    }
}

/// 终端输出 - 流式打印到 stdout，同时保留一份完整回复
pub struct TerminalView<W: Write = io::Stdout> {
    out: W,
    transcript: TranscriptView,
    show_status: bool,
}

impl TerminalView {
    pub fn new(show_status: bool) -> Self {
        Self::with_writer(io::stdout(), show_status)
    }
}

impl<W: Write> TerminalView<W> {
    pub fn with_writer(out: W, show_status: bool) -> Self {
        TerminalView {
            out,
            transcript: TranscriptView::new(),
            show_status,
        }
    }

    pub fn transcript(&self) -> &TranscriptView {
        &self.transcript
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn print(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn line(&mut self, line: &str) {
        self.print(&format!("{}\n", line));
    }

    fn status_line(&mut self, line: &str) {
        if self.show_status {
            self.line(line);
        }
    }
}

impl<W: Write> View for TerminalView<W> {
    fn clear(&mut self) {
        // 终端无法撤回已打印内容，另起一行即可
        if !self.transcript.buffer().is_empty() && !self.transcript.buffer().ends_with('\n') {
            self.print("\n");
        }
        self.transcript.clear();
    }

    fn append(&mut self, text: &str) {
        self.print(&sanitize_for_terminal(text));
        self.transcript.append(text);
    }

    fn set_stop_visible(&mut self, visible: bool) {
        if visible == self.transcript.stop_visible() {
            return;
        }
        if visible {
            // 停止按钮不受 show_status 影响
            self.line(STOP_HINT);
        } else {
            self.print("\n");
        }
        self.transcript.set_stop_visible(visible);
    }

    fn notice(&mut self, notice: &Notice) {
        match notice {
            Notice::TaskStarted { task_id } => {
                self.status_line(&format!("🚀 任务已开始：{}", task_id));
            }
            Notice::TaskFinished { outcome, elapsed, .. } => {
                let label = match outcome {
                    TaskOutcome::Ended => "✅ 回复完成",
                    TaskOutcome::Interrupted => "⏹  已停止生成",
                    TaskOutcome::Failed => "❌ 生成出错",
                };
                match elapsed {
                    Some(elapsed) => self.status_line(&format!(
                        "{}（耗时 {:.1}s）",
                        label,
                        elapsed.num_milliseconds() as f64 / 1000.0
                    )),
                    None => self.status_line(label),
                }
            }
            Notice::CommandSent { command, task_id } => {
                self.status_line(&format!("📨 已发送命令 {}（任务 {}）", command, task_id));
            }
            Notice::TaskStatus {
                task_id,
                state,
                ready,
                successful,
            } => {
                let successful = match successful {
                    Some(true) => "成功",
                    Some(false) => "失败",
                    None => "-",
                };
                self.line(&format!(
                    "📋 任务 {} 状态：{} | 完成：{} | 结果：{}",
                    task_id,
                    state.as_deref().unwrap_or("未知"),
                    if *ready { "是" } else { "否" },
                    successful
                ));
            }
            Notice::ConnectionClosed => {
                self.line("🔌 连接已关闭");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_accumulates_and_clears() {
        let mut view = TranscriptView::new();
        view.append("Hel");
        view.append("lo");
        assert_eq!(view.buffer(), "Hello");
        view.clear();
        assert_eq!(view.buffer(), "");
    }

    #[test]
    fn sanitizer_strips_escape_sequences() {
        assert_eq!(sanitize_for_terminal("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(sanitize_for_terminal("\x1b]0;title\x07text"), "text");
        assert_eq!(sanitize_for_terminal("a\rb\x08c"), "abc");
    }

    #[test]
    fn sanitizer_keeps_plain_text_and_layout() {
        let text = "第一行\n\t缩进 <b>不是标签</b>";
        assert_eq!(sanitize_for_terminal(text), text);
    }

    #[test]
    fn stop_control_shows_without_status_lines() {
        let mut view = TerminalView::with_writer(Vec::new(), false);
        view.notice(&Notice::TaskStarted { task_id: "t1".into() });
        view.set_stop_visible(true);
        assert!(view.transcript().stop_visible());

        let printed = String::from_utf8(view.writer().clone()).unwrap();
        assert_eq!(printed, format!("{}\n", STOP_HINT));
    }

    #[test]
    fn terminal_view_keeps_raw_transcript() {
        let mut view = TerminalView::with_writer(Vec::new(), false);
        view.append("\x1b[1mbold\x1b[0m");
        assert_eq!(view.transcript().buffer(), "\x1b[1mbold\x1b[0m");
        assert_eq!(view.writer().as_slice(), b"bold");
    }
}
