//! Line-oriented front end for one report session.
//!
//! Upload first. While the upload view is shown, a failed upload can be retried with Enter or
//! replaced by typing another path. Once the report is analyzed the findings are printed and
//! every input line is fed to the chat input: Enter sends, a trailing `\` continues the
//! question on the next line. `/quit` or end of input leaves.

use anyhow::{Context as _, bail};
use report_flow::{
    ChatController, ChatKey, KeyOutcome, ReportFile, SendOutcome, SessionEffect,
    SessionOrchestrator, UploadOutcome, UploadView, View,
};
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info, warn};

use crate::render::{
    Palette, render_analysis, render_draft, render_footer, render_header, render_message,
    render_typing, render_upload,
};

pub const QUIT_COMMAND: &str = "/quit";
pub const STILL_WAITING: &str = "Still waiting for the previous answer…";
pub const RETRY_PROMPT: &str = "Press Enter to retry, type the path of another PDF, or /quit.";

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

enum Retry {
    Same,
    Replace(ReportFile),
    Quit,
}

type AnswerTask = Pin<Box<dyn Future<Output = SendOutcome>>>;

enum ChatEvent {
    Answered(SendOutcome),
    StateChanged,
    Line(Option<String>),
}

/// How much of the analysis view has been written out.
#[derive(Default)]
struct TranscriptCursor {
    shown: usize,
    typing: bool,
    draft: String,
}

pub struct TerminalSession<R, W> {
    session: Arc<SessionOrchestrator>,
    input: Lines<R>,
    out: W,
    palette: Palette,
    interactive: bool,
    last_upload: Option<UploadView>,
}

impl<R, W> TerminalSession<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(session: Arc<SessionOrchestrator>, input: R, out: W, palette: Palette) -> Self {
        Self {
            session,
            input: input.lines(),
            out,
            palette,
            interactive: false,
            last_upload: None,
        }
    }

    /// Clear the screen when the analysis appears.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Drive the session to completion and hand back the writer.
    pub async fn run(mut self, files: &[PathBuf]) -> anyhow::Result<W> {
        write!(self.out, "{}", render_header(&self.palette))?;
        let batch = load_batch(files).await?;

        if self.upload_until_analyzed(batch).await? {
            self.converse().await?;
        }

        self.session.shutdown();
        write!(self.out, "\n{}", render_footer(&self.palette))?;
        self.out.flush()?;
        Ok(self.out)
    }

    /// Returns false when the user left before a report was analyzed.
    async fn upload_until_analyzed(&mut self, mut batch: Vec<ReportFile>) -> anyhow::Result<bool> {
        let session = self.session.clone();
        let mut effects = session.effects();

        loop {
            let outcome = {
                let mut upload = session.upload().state().subscribe();
                let submit = session.submit_many(batch.clone());
                tokio::pin!(submit);

                loop {
                    tokio::select! {
                        outcome = &mut submit => break outcome,
                        Ok(()) = upload.changed() => {}
                    }
                    self.write_upload_view()?;
                }
            };

            match outcome {
                UploadOutcome::Ready(_) => break,
                UploadOutcome::Discarded => return Ok(false),
                UploadOutcome::Ignored if session.report().is_some() => break,
                UploadOutcome::Ignored => bail!("An upload is already in progress"),
                UploadOutcome::Rejected(_) | UploadOutcome::Failed(_) => {
                    self.write_upload_view()?;
                    match self.next_retry().await? {
                        Retry::Same => {}
                        Retry::Replace(file) => batch = vec![file],
                        Retry::Quit => return Ok(false),
                    }
                }
            }
        }

        if let Ok(SessionEffect::ScrollToAnalysis) = effects.try_recv() {
            if self.interactive {
                write!(self.out, "{}{}", CLEAR_SCREEN, render_header(&self.palette))?;
            }
        }
        if let View::Analysis(view) = session.view() {
            write!(self.out, "\n{}\n", render_analysis(&view, &self.palette))?;
        }
        Ok(true)
    }

    async fn next_retry(&mut self) -> anyhow::Result<Retry> {
        loop {
            writeln!(self.out, "{}{}{}", self.palette.muted, RETRY_PROMPT, self.palette.reset)?;
            self.out.flush()?;

            let Some(line) = self.input.next_line().await? else {
                return Ok(Retry::Quit);
            };
            let line = line.trim();
            if line == QUIT_COMMAND {
                return Ok(Retry::Quit);
            }
            if line.is_empty() {
                return Ok(Retry::Same);
            }

            match ReportFile::from_path(line).await {
                Ok(file) => return Ok(Retry::Replace(file)),
                Err(e) => writeln!(self.out, "{}{}{}", self.palette.alert, e, self.palette.reset)?,
            }
        }
    }

    fn write_upload_view(&mut self) -> std::io::Result<()> {
        let View::Upload(view) = self.session.view() else {
            return Ok(());
        };
        if self.last_upload.as_ref() == Some(&view) {
            return Ok(());
        }

        write!(self.out, "{}", render_upload(&view, &self.palette))?;
        self.out.flush()?;
        self.last_upload = Some(view);
        Ok(())
    }

    async fn converse(&mut self) -> anyhow::Result<()> {
        let chat = self
            .session
            .chat()
            .context("Report analyzed but the chat is missing")?
            .clone();
        let mut state = chat.state().subscribe();
        let mut cursor = TranscriptCursor::default();
        self.write_chat(&mut cursor)?;

        let mut answering: Option<AnswerTask> = None;
        let mut input_open = true;

        loop {
            // the outstanding answer is polled before the next line is read
            let event = tokio::select! {
                biased;
                outcome = async {
                    match answering.as_mut() {
                        Some(task) => task.await,
                        None => std::future::pending().await,
                    }
                }, if answering.is_some() => ChatEvent::Answered(outcome),
                Ok(()) = state.changed() => ChatEvent::StateChanged,
                line = self.input.next_line(), if input_open => ChatEvent::Line(line?),
                else => break,
            };

            match event {
                ChatEvent::Answered(outcome) => {
                    debug!("Question finished: {:?}", outcome);
                    answering = None;
                    if !input_open {
                        break;
                    }
                }
                ChatEvent::StateChanged => {
                    let awaiting = self.write_chat(&mut cursor)?;
                    if !input_open && !awaiting {
                        break;
                    }
                }
                ChatEvent::Line(None) => {
                    input_open = false;
                    if answering.is_none() {
                        break;
                    }
                    debug!("Input closed, waiting for the outstanding answer");
                }
                ChatEvent::Line(Some(line)) if line.trim() == QUIT_COMMAND => {
                    self.session.shutdown();
                    break;
                }
                ChatEvent::Line(Some(line)) => {
                    if let Some(task) = self.feed_line(&chat, &line)? {
                        answering = Some(task);
                    }
                }
            }
        }

        if !self.session.is_closed() {
            self.write_chat(&mut cursor)?;
        }
        if let Some(task) = answering {
            debug!("Last question finished: {:?}", task.await);
        }
        Ok(())
    }

    /// Type one line into the chat input. Returns the answer task when the line sent a question.
    fn feed_line(&mut self, chat: &ChatController, line: &str) -> std::io::Result<Option<AnswerTask>> {
        if chat.pending() {
            writeln!(self.out, "{}{}{}", self.palette.muted, STILL_WAITING, self.palette.reset)?;
            return Ok(None);
        }

        let (text, continued) = match line.strip_suffix('\\') {
            Some(text) => (text, true),
            None => (line, false),
        };
        for c in text.chars() {
            let _ = chat.handle_key(ChatKey::Char(c));
        }

        match chat.handle_key(ChatKey::Enter {
            newline_modifier: continued,
        }) {
            KeyOutcome::Submitted(ticket) => {
                let chat = chat.clone();
                let task: AnswerTask = Box::pin(async move { chat.answer(ticket).await });
                Ok(Some(task))
            }
            KeyOutcome::Edited | KeyOutcome::Ignored => Ok(None),
        }
    }

    /// Write whatever the analysis view gained since the last call. Returns whether an answer
    /// is still awaited.
    fn write_chat(&mut self, cursor: &mut TranscriptCursor) -> std::io::Result<bool> {
        let View::Analysis(view) = self.session.view() else {
            return Ok(false);
        };

        for message in view.transcript.iter().skip(cursor.shown) {
            write!(self.out, "{}", render_message(message, &self.palette))?;
        }
        cursor.shown = view.transcript.len();

        if view.awaiting_answer && !cursor.typing {
            write!(self.out, "{}", render_typing(&self.palette))?;
        }
        cursor.typing = view.awaiting_answer;

        if view.draft != cursor.draft {
            if !view.draft.is_empty() {
                write!(self.out, "{}", render_draft(&view.draft, &self.palette))?;
            }
            cursor.draft = view.draft;
        }

        self.out.flush()?;
        Ok(view.awaiting_answer)
    }
}

/// Read the files to upload. The first one must be readable; unreadable extras are skipped.
async fn load_batch(files: &[PathBuf]) -> anyhow::Result<Vec<ReportFile>> {
    let Some((first, rest)) = files.split_first() else {
        bail!("No report file given");
    };

    let mut batch = vec![ReportFile::from_path(first).await?];
    for path in rest {
        match ReportFile::from_path(path).await {
            Ok(file) => batch.push(file),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    if batch.len() > 1 {
        info!(
            "{} files given, only {} will be uploaded",
            batch.len(),
            batch[0].file_name
        );
    }
    Ok(batch)
}
