//! Source spans and the pretty-printer shared by every later pipeline stage.
//!
//! `ir3c-reader` produces [`Span`]s while assembling the textual IR3 form;
//! the optimizer, allocator and emitter carry them through unchanged and
//! hand them back here when something goes wrong. The rendering matches the
//! reference compiler's `util.print_context`: a gutter, the offending line
//! with leading whitespace trimmed, and a caret underneath it.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A location in a named source buffer, 0-indexed internally but rendered
/// 1-indexed (matching editors and the reference compiler).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// A span to use when no better location is available (e.g. synthetic
    /// statements introduced by lowering). Never rendered with a source
    /// snippet.
    pub fn synthetic() -> Self {
        Self::new("<synthetic>", 0, 0)
    }

    pub fn advancing(&self, n: u32) -> Span {
        Span::new(self.file.clone(), self.line, self.column + n)
    }

    pub fn advancing_line(&self) -> Span {
        Span::new(self.file.clone(), self.line + 1, 0)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line + 1, self.column + 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    fn color_code(self) -> &'static str {
        match self {
            Severity::Error => "1;31",
            Severity::Warning => "1;35",
        }
    }
}

/// A diagnostic ready to print. `span` is `None` for the "assertion failure"
/// class of error in spec.md §7 (lowering/allocation/emitter invariant
/// violations), which indicate a compiler bug rather than a problem with the
/// input and so have no meaningful source location.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Option<Span>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span: Some(span),
            message: message.into(),
        }
    }

    pub fn bug(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span: None,
            message: message.into(),
        }
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            span: Some(span),
            message: message.into(),
        }
    }

    /// Render this diagnostic, given a way to fetch the text of the
    /// offending source line (the caller owns file I/O; this crate never
    /// touches the filesystem). `line_text` is the single source line the
    /// span points at, with no trailing newline.
    pub fn render(&self, colorize: bool, line_text: Option<&str>) -> String {
        let mut out = String::new();
        match &self.span {
            Some(span) => {
                out.push_str(&format!(
                    "{}: {}: {}\n",
                    span,
                    paint(self.severity.label().to_string() + ":", self.severity.color_code(), colorize),
                    paint(self.message.clone(), "1", colorize),
                ));
                if let Some(line) = line_text {
                    out.push_str(&render_context(span, line, self.severity.color_code(), colorize));
                }
            }
            None => {
                out.push_str(&format!(
                    "<unknown location>: {}: {}\n",
                    paint("error:".to_string(), Severity::Error.color_code(), colorize),
                    paint(self.message.clone(), "1", colorize),
                ));
            }
        }
        out
    }
}

/// The one error type every fallible pipeline stage returns. `Parse` is
/// produced only by `ir3c-reader` (standing in for the out-of-scope
/// front end's parse/type errors); `Invariant` covers every assertion
/// failure in lowering, register allocation, and code emission — these
/// indicate a compiler bug in the input IR3, not a source-level mistake,
/// and the driver never retries on them (the allocator's bounded spill
/// retry is internal to `ir3c-regalloc`, not surfaced as a retry here).
#[derive(Error, Debug, Clone)]
pub enum Ir3cError {
    #[error("{span}: {message}")]
    Parse { span: Span, message: String },
    #[error("internal invariant violated: {message}")]
    Invariant { message: String },
}

impl Ir3cError {
    pub fn parse(span: Span, message: impl Into<String>) -> Self {
        Ir3cError::Parse {
            span,
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Ir3cError::Invariant {
            message: message.into(),
        }
    }

    /// Render this error as a `Diagnostic` for the shared pretty-printer.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Ir3cError::Parse { span, message } => Diagnostic::error(span.clone(), message.clone()),
            Ir3cError::Invariant { message } => Diagnostic::bug(message.clone()),
        }
    }
}

pub type Ir3cResult<T> = Result<T, Ir3cError>;

const TAB_WIDTH: usize = 4;

fn render_context(span: &Span, raw_line: &str, color: &str, colorize: bool) -> String {
    let gutter_width = 4 + (1 + span.line).to_string().len();
    let expanded = raw_line.replace('\t', &" ".repeat(TAB_WIDTH));
    let trimmed = expanded.trim_start();
    let stripped_width = expanded.len() - trimmed.len();
    let col = span.column as usize;
    let arrow_pad = col.saturating_sub(stripped_width);

    let mut out = String::new();
    out.push_str(&format!("{}|\n", " ".repeat(gutter_width - 2)));
    out.push_str(&format!(" {} |     {}\n", 1 + span.line, trimmed));
    let arrow = format!("    {}^", " ".repeat(arrow_pad));
    out.push_str(&format!(
        "{}| {}\n",
        " ".repeat(gutter_width - 2),
        paint(arrow, color, colorize)
    ));
    out
}

fn paint(msg: String, color: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", color, msg)
    } else {
        msg
    }
}

/// Escape a byte string for embedding in a `.asciz` directive or a rendered
/// IR3 constant, matching the reference compiler's `escape_string`: printable
/// ASCII passes through, `\n \r \t` get their short forms, anything else
/// becomes `\xNN`.
pub fn escape_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            0x20..=0x7e => out.push(b as char),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_control_bytes() {
        assert_eq!(escape_string(b"hi\n"), "hi\\n");
        assert_eq!(escape_string(&[0x01]), "\\x01");
    }

    #[test]
    fn renders_caret_under_trimmed_column() {
        let span = Span::new("t.ir3", 2, 6);
        let diag = Diagnostic::error(span, "unexpected token");
        let rendered = diag.render(false, Some("   x = y + 1;"));
        assert!(rendered.contains("t.ir3:3:7"));
        assert!(rendered.contains("x = y + 1;"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn bug_diagnostics_have_no_span() {
        let diag = Diagnostic::bug("double spill of 'x'");
        let rendered = diag.render(false, None);
        assert!(rendered.starts_with("<unknown location>"));
    }
}
