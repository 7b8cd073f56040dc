//! Terminal stand-ins for the UI collaborators
//!
//! Toasts go to stderr with a coloured level prefix; the chime is the
//! terminal bell.

use colored::*;
use std::io::{self, Write};

use crate::notify::{Chime, Toast, ToastKind, ToastSink};
use crate::search::SearchSessionState;

fn format_prefix(kind: ToastKind) -> String {
  let (label, color) = match kind {
    ToastKind::Success => ("ok", Color::Green),
    ToastKind::Error => ("error", Color::Red),
    ToastKind::Info => ("info", Color::Blue),
  };
  format!("[{}]{:<width$}", label.color(color).bold(), "", width = 7 - label.len() - 2)
}

pub fn format_toast(toast: &Toast) -> String {
  let prefix = format_prefix(toast.kind);
  let mut out = format!("{prefix} {}", toast.title.bold());
  for line in toast.message.lines() {
    out.push('\n');
    out.push_str(&format!("{prefix} {line}"));
  }
  out
}

pub struct TerminalToasts;

impl ToastSink for TerminalToasts {
  fn show(&self, toast: Toast) {
    eprintln!("{}", format_toast(&toast));
  }
}

pub struct TerminalBell;

impl Chime for TerminalBell {
  fn play(&self) -> io::Result<()> {
    let mut stderr = io::stderr();
    stderr.write_all(b"\x07")?;
    stderr.flush()
  }
}

pub fn format_results(state: &SearchSessionState) -> String {
  if state.has_error {
    return "Search is unavailable right now. Try again in a moment.".red().to_string();
  }
  if state.results.is_empty() {
    return format!("No results for '{}'", state.search_term.trim());
  }

  let mut lines = Vec::new();
  for result in &state.results {
    lines.push(format!(
      "{:<9} {}  {}",
      format!("[{}]", result.kind).cyan(),
      result.title.bold(),
      result.url.dimmed()
    ));
    if let Some(description) = &result.description {
      lines.push(format!("          {description}"));
    }

    let mut meta = Vec::new();
    if let Some(status) = &result.status {
      meta.push(format!("status: {status}"));
    }
    if let Some(priority) = &result.priority {
      meta.push(format!("priority: {priority}"));
    }
    if let Some(assignee) = &result.assignee {
      meta.push(format!("assignee: {assignee}"));
    }
    if let Some(tags) = result.tags.as_ref().filter(|tags| !tags.is_empty()) {
      meta.push(format!("tags: {}", tags.join(", ")));
    }
    if !meta.is_empty() {
      lines.push(format!("          {}", meta.join(" | ").dimmed()));
    }
  }
  lines.join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::notify::ToastPosition;
  use crate::search::{SearchResult, SearchResultType};
  use std::time::Duration;

  #[test]
  fn test_toast_lines_carry_title_and_message() {
    let toast = Toast {
      kind: ToastKind::Error,
      title: "Sales disconnected".into(),
      message: "line one\nline two".into(),
      duration: Duration::from_secs(4),
      position: ToastPosition::TopCenter,
    };

    let rendered = format_toast(&toast);
    assert_eq!(rendered.lines().count(), 3);
    assert!(rendered.contains("Sales disconnected"));
    assert!(rendered.contains("line two"));
  }

  #[test]
  fn test_results_rendering() {
    let state = SearchSessionState {
      search_term: "acme".into(),
      results: vec![SearchResult {
        id: "d-1".into(),
        kind: SearchResultType::Deal,
        title: "Acme renewal".into(),
        description: Some("Annual contract".into()),
        url: "/deals/d-1".into(),
        priority: Some("high".into()),
        status: None,
        assignee: Some("Ana".into()),
        tags: Some(vec!["q3".into()]),
      }],
      ..SearchSessionState::default()
    };

    let rendered = format_results(&state);
    assert!(rendered.contains("Acme renewal"));
    assert!(rendered.contains("Annual contract"));
    assert!(rendered.contains("tags: q3"));
  }

  #[test]
  fn test_empty_and_error_states() {
    let empty = SearchSessionState { search_term: " zzz ".into(), ..SearchSessionState::default() };
    assert_eq!(format_results(&empty), "No results for 'zzz'");

    let failed = SearchSessionState { has_error: true, ..SearchSessionState::default() };
    assert!(format_results(&failed).contains("unavailable"));
  }
}
