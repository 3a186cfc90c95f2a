//! Terminal rendering. Every function here is a pure function of a view value.

use report_flow::{AnalysisView, MedicalTerm, Message, MessageRole, Theme, UploadView};
use std::fmt::Write as _;

pub const FOOTER: &str = "⚠️ Educational use only. Not a substitute for professional medical advice.";
pub const BUSY_TITLE: &str = "Analyzing your report…";
pub const BUSY_HINT: &str = "This may take a few moments";
pub const TYPING_INDICATOR: &str = "• • •";
pub const CONTINUATION_HINT: &str = "finish with a line that does not end in \\ to send";

/// ANSI escapes for one theme. [`Palette::plain`] renders without color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub accent: &'static str,
    pub muted: &'static str,
    pub alert: &'static str,
    pub ok: &'static str,
    pub bold: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                accent: "\x1b[96m",
                muted: "\x1b[90m",
                alert: "\x1b[91m",
                ok: "\x1b[92m",
                bold: "\x1b[1m",
                reset: "\x1b[0m",
            },
            Theme::Light => Self {
                accent: "\x1b[34m",
                muted: "\x1b[37m",
                alert: "\x1b[31m",
                ok: "\x1b[32m",
                bold: "\x1b[1m",
                reset: "\x1b[0m",
            },
        }
    }

    pub fn plain() -> Self {
        Self {
            accent: "",
            muted: "",
            alert: "",
            ok: "",
            bold: "",
            reset: "",
        }
    }
}

pub fn render_header(p: &Palette) -> String {
    format!(
        "{}MED REPORT{} {}· Clinical Insights, Simplified{}\n{}Medical Report Explainer{}\n",
        p.accent, p.reset, p.muted, p.reset, p.bold, p.reset
    )
}

pub fn render_upload(view: &UploadView, p: &Palette) -> String {
    let mut out = String::new();
    if view.busy {
        let _ = writeln!(out, "{}⏳ {}{}", p.accent, BUSY_TITLE, p.reset);
        let _ = writeln!(out, "{}{}{}", p.muted, BUSY_HINT, p.reset);
    } else {
        let _ = writeln!(out, "Drop in your medical report");
        let _ = writeln!(out, "{}PDF only{}", p.muted, p.reset);
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "{}{}{}", p.alert, error, p.reset);
    }
    out
}

pub fn render_analysis(view: &AnalysisView, p: &Palette) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}📋 Report Analysis{}", p.bold, p.reset);
    let _ = writeln!(out, "{}KEY FINDINGS{}", p.accent, p.reset);
    for point in &view.key_findings {
        let _ = writeln!(out, "  • {}", point);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}MEDICAL TERMS DETECTED{}", p.accent, p.reset);
    for term in &view.terms {
        out.push_str(&render_term(term, p));
    }

    out
}

pub fn render_term(term: &MedicalTerm, p: &Palette) -> String {
    let mut out = String::new();
    let (mark, color) = if term.is_abnormal {
        ("⚠️", p.alert)
    } else {
        ("✓", p.ok)
    };

    let _ = write!(out, "  {}{} {}{}", color, mark, term.term, p.reset);
    if let Some(value) = term.display_value() {
        let _ = write!(out, "  {}{}{}", p.bold, value, p.reset);
    }
    let _ = writeln!(out);

    if !term.explanation.is_empty() {
        let _ = writeln!(out, "    {}", term.explanation);
    }
    if let Some(status) = term.status_label() {
        let _ = writeln!(out, "    Status: {}", status);
    }
    out
}

pub fn render_message(message: &Message, p: &Palette) -> String {
    let time = message.timestamp.format("%H:%M");
    match message.role {
        MessageRole::User => format!(
            "{}[{}] You:{} {}\n",
            p.accent, time, p.reset, message.content
        ),
        MessageRole::Assistant => format!(
            "{}[{}] Assistant:{} {}\n",
            p.ok, time, p.reset, message.content
        ),
    }
}

pub fn render_typing(p: &Palette) -> String {
    format!("{}Assistant: {}{}\n", p.muted, TYPING_INDICATOR, p.reset)
}

/// Shown while a multi-line question is being typed.
pub fn render_draft(draft: &str, p: &Palette) -> String {
    format!(
        "{}… {} line(s) so far, {}{}\n",
        p.muted,
        draft.lines().count(),
        CONTINUATION_HINT,
        p.reset
    )
}

pub fn render_footer(p: &Palette) -> String {
    format!("{}{}{}\n", p.muted, FOOTER, p.reset)
}
