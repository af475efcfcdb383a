//! Markdown and macro rendering of part content.
//!
//! The build engine only depends on the [`Renderer`] trait: given the
//! Markdown of a part and a [`Mode`], a renderer returns the HTML together
//! with the files it included and the glossary terms it referenced. Those
//! two sets feed the include lists and term reference lists of the build
//! graph.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use pulldown_cmark::{html, Options, Parser};
use regex::{Captures, Regex};
use sedrila_common::Mode;
use sedrila_diagnostics::{DiagnosticCode, Severity};

use crate::template::escape_html;

/// Input of one render call.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// The part file; include paths are relative to its directory.
    pub sourcefile: &'a Path,
    /// Name of the part being rendered.
    pub partname: &'a str,
    /// The Markdown text after the topmatter.
    pub markdown: &'a str,
    /// Which variant to produce.
    pub mode: Mode,
}

/// A content problem found while rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// How serious the problem is.
    pub severity: Severity,
    /// The diagnostic code to report it under.
    pub code: DiagnosticCode,
    /// Description of the problem.
    pub message: String,
    /// Found inside an instructor-only block.
    pub instructor_only: bool,
}

/// Output of one render call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    /// The HTML fragment.
    pub html: String,
    /// Paths of all files included, as given to the file system.
    pub includes: BTreeSet<String>,
    /// Glossary terms referenced.
    pub termrefs: BTreeSet<String>,
    /// Problems to report against the part file.
    pub problems: Vec<Problem>,
}

/// Turns part content into HTML.
pub trait Renderer {
    /// Renders one part's content in the requested mode.
    fn render(&self, request: &RenderRequest<'_>) -> Rendered;
}

/// The bundled renderer: sedrila macros, then CommonMark via `pulldown-cmark`.
///
/// Supported macros are `[INCLUDE::file]`, `[TERMREF::term]`,
/// `[INSTRUCTOR::heading]` … `[ENDINSTRUCTOR]` and `[WARNING]` …
/// `[ENDWARNING]`.
#[derive(Debug, Default, Clone)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    /// Creates the renderer.
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Rendered {
        let mut expander = Expander::new(request);
        let markdown = expander.expand(request.markdown);
        let mut html_output = String::new();
        let options = Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
        html::push_html(&mut html_output, Parser::new_ext(&markdown, options));
        Rendered {
            html: html_output,
            includes: expander.includes,
            termrefs: expander.termrefs,
            problems: expander.problems,
        }
    }
}

/// Anchor id of a glossary term.
pub fn term_anchor(term: &str) -> String {
    let slug: String = term
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("term-{slug}")
}

fn macro_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([A-Z][A-Z0-9_]+)(?:::(.+?))?(?:::(.+?))?\]").expect("macro regex must compile")
    })
}

struct Expander<'a> {
    request: &'a RenderRequest<'a>,
    includes: BTreeSet<String>,
    termrefs: BTreeSet<String>,
    problems: Vec<Problem>,
    in_instructor: bool,
    in_warning: bool,
}

impl<'a> Expander<'a> {
    fn new(request: &'a RenderRequest<'a>) -> Self {
        Self {
            request,
            includes: BTreeSet::new(),
            termrefs: BTreeSet::new(),
            problems: Vec::new(),
            in_instructor: false,
            in_warning: false,
        }
    }

    fn student_skipping(&self) -> bool {
        self.in_instructor && self.request.mode == Mode::Student
    }

    fn expand(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in macro_re().captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if text[whole.end()..].starts_with('(') {
                continue; // a Markdown link
            }
            if !self.student_skipping() {
                out.push_str(&text[last..whole.start()]);
            }
            last = whole.end();
            let name = &caps[1];
            if self.student_skipping() && name != "ENDINSTRUCTOR" {
                continue;
            }
            self.expand_macro(name, &caps, &mut out);
        }
        if !self.student_skipping() {
            out.push_str(&text[last..]);
        }
        if self.in_instructor {
            self.problem(Severity::Warning, DiagnosticCode::UNBALANCED_BLOCK, "[INSTRUCTOR] lacks [ENDINSTRUCTOR]");
            if self.request.mode.is_instructor() {
                out.push_str("\n\n</div>\n");
            }
        }
        if self.in_warning {
            self.problem(Severity::Warning, DiagnosticCode::UNBALANCED_BLOCK, "[WARNING] lacks [ENDWARNING]");
            out.push_str("\n\n</div>\n");
        }
        out
    }

    fn expand_macro(&mut self, name: &str, caps: &Captures<'_>, out: &mut String) {
        let args: Vec<&str> = [caps.get(2), caps.get(3)]
            .into_iter()
            .flatten()
            .map(|m| m.as_str().trim())
            .collect();
        let expected = match name {
            "INCLUDE" | "TERMREF" | "INSTRUCTOR" => 1,
            "ENDINSTRUCTOR" | "WARNING" | "ENDWARNING" => 0,
            _ => {
                self.problem(
                    Severity::Warning,
                    DiagnosticCode::UNKNOWN_MACRO,
                    format!("unknown macro [{name}]"),
                );
                out.push_str(&caps[0]);
                return;
            }
        };
        if args.len() != expected {
            self.problem(
                Severity::Error,
                DiagnosticCode::MACRO_ARGUMENTS,
                format!("[{name}] expects {expected} argument(s), got {}", args.len()),
            );
            return;
        }
        match name {
            "INCLUDE" => self.include(args[0], out),
            "TERMREF" => {
                self.termrefs.insert(args[0].to_string());
                out.push_str(&format!(
                    "<a href='glossary.html#{}' class='termref'>{}</a>",
                    term_anchor(args[0]),
                    escape_html(args[0])
                ));
            }
            "INSTRUCTOR" => {
                if self.in_instructor {
                    self.problem(Severity::Warning, DiagnosticCode::UNBALANCED_BLOCK, "nested [INSTRUCTOR] block");
                    return;
                }
                self.in_instructor = true;
                if self.request.mode.is_instructor() {
                    out.push_str(&format!(
                        "\n<div class='section instructor'><div class='section-title'>{}</div>\n\n",
                        escape_html(args[0])
                    ));
                }
            }
            "ENDINSTRUCTOR" => {
                if !self.in_instructor {
                    self.problem(Severity::Warning, DiagnosticCode::UNBALANCED_BLOCK, "[ENDINSTRUCTOR] without [INSTRUCTOR]");
                    return;
                }
                if self.request.mode.is_instructor() {
                    out.push_str("\n\n</div>\n");
                }
                self.in_instructor = false;
            }
            "WARNING" => {
                if self.in_warning {
                    self.problem(Severity::Warning, DiagnosticCode::UNBALANCED_BLOCK, "nested [WARNING] block");
                    return;
                }
                self.in_warning = true;
                out.push_str("\n<div class='section warning'>\n\n");
            }
            _ => {
                if !self.in_warning {
                    self.problem(Severity::Warning, DiagnosticCode::UNBALANCED_BLOCK, "[ENDWARNING] without [WARNING]");
                    return;
                }
                out.push_str("\n\n</div>\n");
                self.in_warning = false;
            }
        }
    }

    fn include(&mut self, file: &str, out: &mut String) {
        let base = self.request.sourcefile.parent().unwrap_or(Path::new(""));
        let path = base.join(file);
        self.includes.insert(path.to_string_lossy().into_owned());
        match std::fs::read_to_string(&path) {
            Ok(text) => out.push_str(&text),
            Err(err) => self.problem(
                Severity::Warning,
                DiagnosticCode::INCLUDE_NOT_FOUND,
                format!("cannot include '{}': {err}", path.display()),
            ),
        }
    }

    fn problem(&mut self, severity: Severity, code: DiagnosticCode, message: impl Into<String>) {
        self.problems.push(Problem {
            severity,
            code,
            message: message.into(),
            instructor_only: self.in_instructor,
        });
    }
}
