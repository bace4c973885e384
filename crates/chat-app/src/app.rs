use std::io::{self, Write};

use resume_llm::create_adapter;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::chat::{StreamEventPayload, ThreadSummary};
use crate::interrupt::Interrupts;
use crate::runtime::{ActiveRun, LocalRuntime};
use crate::settings::{AssistantSettings, SettingsStore};

pub const APP_TITLE: &str = "Resume Assistant";
pub const PAGE_TITLE: &str = "Chat";
const PROMPT: &str = "> ";

const HELP_TEXT: &str = "\
commands:
  /new          start a new thread
  /threads      list threads
  /switch N     switch to thread N
  /archive N    archive thread N
  /url [URL]    show or set the backend base URL
  /help         show this help
  /quit         exit
Ctrl-C stops the reply being streamed, or exits at the prompt.";

/// Header line shown above the thread, e.g. `Resume Assistant › Chat`.
pub fn breadcrumb() -> String {
    format!("{APP_TITLE} › {PAGE_TITLE}")
}

/// Slash command typed at the prompt.
///
/// Thread positions are one based as displayed; parsing converts them to zero based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewThread,
    ListThreads,
    Switch(usize),
    Archive(usize),
    ApiUrl(Option<String>),
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// Returns `None` when `line` is a chat message rather than a command.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let body = line.strip_prefix('/')?;
        let (name, argument) = match body.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (body, ""),
        };

        let command = match (name, argument) {
            ("new", "") => Self::NewThread,
            ("threads", "") => Self::ListThreads,
            ("switch", position) => match parse_position(position) {
                Some(position) => Self::Switch(position),
                None => Self::Unknown(line.to_string()),
            },
            ("archive", position) => match parse_position(position) {
                Some(position) => Self::Archive(position),
                None => Self::Unknown(line.to_string()),
            },
            ("url", "") => Self::ApiUrl(None),
            ("url", url) => Self::ApiUrl(Some(url.to_string())),
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        };

        Some(command)
    }
}

fn parse_position(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()?.checked_sub(1)
}

/// Turns cumulative snapshots into the text not yet written to the terminal.
#[derive(Debug, Default)]
pub struct SnapshotPrinter {
    printed: String,
}

impl SnapshotPrinter {
    /// Returns the part of `snapshot` not printed yet.
    pub fn delta(&mut self, snapshot: &str) -> String {
        let delta = match snapshot.strip_prefix(self.printed.as_str()) {
            Some(suffix) => suffix.to_string(),
            // Snapshots only grow; rewrite the whole line if one ever doesn't.
            None => format!("\n{snapshot}"),
        };
        self.printed = snapshot.to_string();
        delta
    }
}

/// Line-oriented chat shell over a [`LocalRuntime`].
///
/// An interrupt stops the reply being streamed, or leaves the shell when it
/// arrives at the prompt.
pub struct ChatAppShell<W: Write> {
    runtime: LocalRuntime,
    settings: SettingsStore,
    interrupts: Interrupts,
    out: W,
}

impl<W: Write> ChatAppShell<W> {
    /// Creates a shell writing to `out`.
    pub fn new(
        runtime: LocalRuntime,
        settings: SettingsStore,
        interrupts: Interrupts,
        out: W,
    ) -> Self {
        Self {
            runtime,
            settings,
            interrupts,
            out,
        }
    }

    /// Returns the runtime driving the threads.
    pub fn runtime(&self) -> &LocalRuntime {
        &self.runtime
    }

    /// Reads lines until EOF, `/quit` or an interrupt at the prompt.
    pub async fn run<R>(&mut self, input: R) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.render_header()?;
        let mut lines = input.lines();

        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            // Pending input wins over an interrupt that arrived alongside it.
            let line = tokio::select! {
                biased;
                line = lines.next_line() => line?,
                () = self.interrupts.next() => {
                    tracing::debug!("interrupted at prompt");
                    None
                }
            };
            let Some(line) = line else {
                writeln!(self.out)?;
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match Command::parse(line) {
                Some(Command::Quit) => break,
                Some(command) => self.handle_command(command)?,
                None => self.submit(line).await?,
            }
        }

        self.out.flush()
    }

    fn render_header(&mut self) -> io::Result<()> {
        let header = breadcrumb();
        writeln!(self.out, "{header}")?;
        writeln!(self.out, "{}", "─".repeat(header.chars().count()))?;
        writeln!(
            self.out,
            "backend: {}  (type /help for commands)",
            self.settings.settings().api_url
        )
    }

    async fn submit(&mut self, text: &str) -> io::Result<()> {
        match self.runtime.submit(text) {
            Ok(run) => self.stream_reply(run).await,
            Err(error) => writeln!(self.out, "error: {error}"),
        }
    }

    async fn stream_reply(&mut self, mut run: ActiveRun) -> io::Result<()> {
        let mut printer = SnapshotPrinter::default();

        loop {
            let interruptible = !run.is_aborted();
            let next = tokio::select! {
                event = run.next_event() => Some(event),
                () = self.interrupts.next(), if interruptible => None,
            };

            let Some(event) = next else {
                tracing::debug!(thread_id = run.target().thread_id.0, "reply interrupted");
                run.abort();
                continue;
            };
            let Some(event) = event else {
                break;
            };

            match &event.payload {
                StreamEventPayload::Snapshot(text) => {
                    write!(self.out, "{}", printer.delta(text))?;
                    self.out.flush()?;
                }
                StreamEventPayload::Done => writeln!(self.out)?,
                StreamEventPayload::Error(message) => {
                    writeln!(self.out)?;
                    writeln!(self.out, "error: {message}")?;
                }
                StreamEventPayload::Cancelled => {
                    writeln!(self.out)?;
                    writeln!(self.out, "[stopped]")?;
                }
            }

            if let Err(error) = self.runtime.apply_stream_event(event) {
                tracing::warn!(error = %error, "failed to apply stream event");
            }
        }

        Ok(())
    }

    fn handle_command(&mut self, command: Command) -> io::Result<()> {
        match command {
            Command::NewThread => {
                self.runtime.threads_mut().create();
                writeln!(self.out, "started a new thread")
            }
            Command::ListThreads => {
                let summaries = self.runtime.threads().summaries();
                for summary in &summaries {
                    writeln!(self.out, "{}", format_summary(summary))?;
                }
                Ok(())
            }
            Command::Switch(position) => match self.runtime.threads_mut().select(position) {
                Some(_) => {
                    let title = self.runtime.threads().active().title();
                    writeln!(self.out, "switched to {}. {title}", position + 1)
                }
                None => writeln!(self.out, "no thread {}", position + 1),
            },
            Command::Archive(position) => match self.runtime.threads_mut().archive(position) {
                Some(thread) => writeln!(self.out, "archived {}", thread.title()),
                None => writeln!(self.out, "no thread {}", position + 1),
            },
            Command::ApiUrl(None) => {
                writeln!(self.out, "backend: {}", self.settings.settings().api_url)
            }
            Command::ApiUrl(Some(url)) => self.set_api_url(url),
            Command::Help => writeln!(self.out, "{HELP_TEXT}"),
            Command::Quit => Ok(()),
            Command::Unknown(line) => {
                writeln!(self.out, "unknown command `{line}`, type /help for commands")
            }
        }
    }

    fn set_api_url(&mut self, url: String) -> io::Result<()> {
        if let Err(error) = self.settings.update(AssistantSettings { api_url: url }) {
            tracing::warn!(error = %error, "failed to save settings");
            writeln!(self.out, "error: {error}")?;
        }

        let settings = self.settings.settings();
        match create_adapter(settings.adapter_config()) {
            Ok(adapter) => {
                self.runtime.set_adapter(adapter);
                writeln!(self.out, "backend: {}", settings.api_url)
            }
            Err(error) => writeln!(self.out, "error: {error}"),
        }
    }
}

fn format_summary(summary: &ThreadSummary) -> String {
    let marker = if summary.is_active { '*' } else { ' ' };
    let streaming = if summary.is_streaming { " [streaming]" } else { "" };
    format!(
        "{marker} {}. {} ({} messages){streaming}",
        summary.position + 1,
        summary.title,
        summary.message_count
    )
}
