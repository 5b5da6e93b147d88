//! Plain-text rendering of session events for the terminal.

use std::fmt::Write;
use tutor_core::{
    Mode, SessionEvent,
    types::{AnalysisResult, DiagramResult, Message, Payload, Role, Severity},
};

pub fn mode_title(mode: Mode) -> &'static str {
    match mode {
        Mode::Analyzing => "Code Analysis",
        Mode::Learning => "Algorithm Learning",
        Mode::MathExploring => "Math Concepts",
        Mode::TechnicalExploring => "Technical Concepts",
    }
}

pub fn mode_menu() -> String {
    let mut out = String::from("Choose a mode with /mode <name>:");
    for mode in Mode::ALL {
        let _ = write!(out, "\n  {:<10} {}", mode.to_string(), mode_title(mode));
    }
    out
}

/// Text to print for `event`, or `None` for events with no visible effect.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::ModeChanged(Some(mode)) => Some(format!("== {} ==", mode_title(*mode))),
        SessionEvent::ModeChanged(None) => Some(mode_menu()),
        SessionEvent::MessageAppended(message) => Some(render_message(message)),
        SessionEvent::EditorUpdated { language, code } => {
            Some(format!("[editor: {}]\n{}\n[/editor]", language, code))
        }
        SessionEvent::BusyChanged(true) => Some("... thinking".to_string()),
        SessionEvent::BusyChanged(false) => None,
    }
}

pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::Student => "you",
        Role::Tutor => "tutor",
    };
    let mut out = format!("{}> {}", speaker, message.content);
    match &message.payload {
        Some(Payload::Analysis(result)) => render_analysis(&mut out, result),
        Some(Payload::Diagram(result)) => render_diagram(&mut out, result),
        Some(Payload::Code(code)) => {
            let _ = write!(out, "\n{}", code);
        }
        None => {}
    }
    out
}

fn render_analysis(out: &mut String, result: &AnalysisResult) {
    let _ = write!(out, "\n  Score: {}/100", result.score);
    if !result.language_detected.is_empty() {
        let _ = write!(out, " ({})", result.language_detected);
    }
    if !result.summary.is_empty() {
        let _ = write!(out, "\n  {}", result.summary);
    }
    for issue in &result.issues {
        let severity = match issue.severity {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        };
        let _ = write!(out, "\n  [{}] {}", severity, issue.principle);
        if !issue.line_content.is_empty() {
            let _ = write!(out, "\n      > {}", issue.line_content);
        }
        for (label, text) in [
            ("why", &issue.explanation),
            ("impact", &issue.impact),
            ("hint", &issue.hint),
        ] {
            if !text.is_empty() {
                let _ = write!(out, "\n      {}: {}", label, text);
            }
        }
    }
    if !result.strengths.is_empty() {
        out.push_str("\n  Strengths:");
        for strength in &result.strengths {
            let _ = write!(out, "\n    + {}", strength);
        }
    }
}

fn render_diagram(out: &mut String, result: &DiagramResult) {
    let _ = write!(out, "\n{}", result.diagram);
    if !result.explanation.is_empty() {
        let _ = write!(out, "\n  {}", result.explanation);
    }
    for point in &result.key_points {
        let _ = write!(out, "\n    * {}", point);
    }
}
