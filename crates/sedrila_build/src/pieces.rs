//! Pieces computed from a part's source file: topmatter, content, bodies.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use sedrila_cache::{State, Value};
use sedrila_common::{Mode, SedrilaResult};
use sedrila_diagnostics::{Diagnostic, DiagnosticCode};

use crate::directory::Directory;
use crate::element::ElementId;
use crate::kind::Kind;
use crate::render::{term_anchor, Problem, RenderRequest, Rendered};
use crate::template::escape_html;

type Topmatter = BTreeMap<String, serde_json::Value>;

impl Directory {
    /// Splits the part file into topmatter and content and stores both.
    pub(crate) fn build_topmatter(&mut self, id: ElementId) -> SedrilaResult<()> {
        let part = self.part_of(id)?;
        let sourcefile = self.part_info(part)?.sourcefile.clone();
        let (topmatter, content) = match std::fs::read_to_string(&sourcefile) {
            Ok(text) => self.split_topmatter(&text, &sourcefile),
            Err(err) => {
                self.report_error(
                    DiagnosticCode::MISSING_FILE,
                    format!("cannot read part file: {err}"),
                    &sourcefile,
                );
                (Topmatter::new(), String::new())
            }
        };
        self.commit_built_value(id, Value::Map(topmatter));
        let content_id = self.sibling(id, Kind::Content)?;
        self.commit_built_value(content_id, Value::Scalar(content));
        Ok(())
    }

    fn split_topmatter(&mut self, text: &str, sourcefile: &Path) -> (Topmatter, String) {
        let mut offset = 0;
        let mut separator = None;
        for line in text.split_inclusive('\n') {
            if line.trim_end() == "---" {
                separator = Some((offset, offset + line.len()));
                break;
            }
            offset += line.len();
        }
        let Some((yaml_end, content_start)) = separator else {
            self.report_error(
                DiagnosticCode::MISSING_SEPARATOR,
                "no '---' line separates topmatter from content",
                sourcefile,
            );
            return (Topmatter::new(), text.to_string());
        };
        let yaml = &text[..yaml_end];
        let content = text[content_start..].to_string();
        if yaml.trim().is_empty() {
            return (Topmatter::new(), content);
        }
        let topmatter = match serde_yaml::from_str::<serde_json::Value>(yaml) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            Ok(serde_json::Value::Null) => Topmatter::new(),
            Ok(other) => {
                self.report_error(
                    DiagnosticCode::MALFORMED_TOPMATTER,
                    format!("topmatter must be a mapping, found {}", json_type(&other)),
                    sourcefile,
                );
                Topmatter::new()
            }
            Err(err) => {
                self.report_error(
                    DiagnosticCode::MALFORMED_TOPMATTER,
                    format!("malformed topmatter: {err}"),
                    sourcefile,
                );
                Topmatter::new()
            }
        };
        (topmatter, content)
    }

    /// A body whose part file was flagged in the previous run is rebuilt so
    /// that its diagnostics are reported again.
    pub(crate) fn check_body(&mut self, id: ElementId) -> SedrilaResult<()> {
        let part = self.part_of(id)?;
        let dirty = self.cache.is_dirty(&self.part_info(part)?.sourcefile);
        let element = self.element_mut(id);
        if dirty && element.state == State::Unchanged {
            tracing::debug!(target: "sedrila.build", element = %element, "source file is dirty");
            element.state = State::Changed;
        }
        Ok(())
    }

    fn render_part(&mut self, id: ElementId, mode: Mode) -> SedrilaResult<Rendered> {
        let part = self.part_of(id)?;
        let sourcefile = self.part_info(part)?.sourcefile.clone();
        let content = self.sibling(id, Kind::Content)?;
        let markdown = self.element(content).scalar().to_string();
        let name = self.element(id).name.clone();
        let mut rendered = self.renderer.render(&RenderRequest {
            sourcefile: &sourcefile,
            partname: &name,
            markdown: &markdown,
            mode,
        });
        for problem in std::mem::take(&mut rendered.problems) {
            // the student pass already reported what both variants share
            if mode == Mode::Student || problem.instructor_only {
                self.report_problem(problem, &sourcefile);
            }
        }
        Ok(rendered)
    }

    fn report_problem(&mut self, problem: Problem, sourcefile: &Path) {
        let diagnostic = if problem.severity.is_error() {
            Diagnostic::error(problem.code, problem.message)
        } else {
            Diagnostic::warning(problem.code, problem.message)
        };
        self.report(diagnostic.in_file(sourcefile));
    }

    /// Renders one variant of a part and stores the HTML, the include list
    /// and (for students) the term references.
    pub(crate) fn build_body(&mut self, id: ElementId, mode: Mode) -> SedrilaResult<()> {
        let rendered = self.render_part(id, mode)?;
        self.commit_built_value(id, Value::Scalar(rendered.html));
        let list_kind = match mode {
            Mode::Student => Kind::IncludeListS,
            Mode::Instructor => Kind::IncludeListI,
        };
        let list = self.sibling(id, list_kind)?;
        self.commit_built_value(list, Value::Set(rendered.includes));
        if mode == Mode::Student {
            let termrefs = self.sibling(id, Kind::TermrefList)?;
            self.commit_built_value(termrefs, Value::Set(rendered.termrefs));
        }
        Ok(())
    }

    /// Renders the glossary and appends an index of the parts that
    /// reference each term.
    pub(crate) fn build_glossarybody(&mut self, id: ElementId) -> SedrilaResult<()> {
        let rendered = self.render_part(id, Mode::Student)?;
        let mut html = rendered.html;
        html.push_str(&self.term_index()?);
        self.commit_built_value(id, Value::Scalar(html));
        let list = self.sibling(id, Kind::IncludeListS)?;
        self.commit_built_value(list, Value::Set(rendered.includes));
        Ok(())
    }

    fn term_index(&self) -> SedrilaResult<String> {
        let mut references: BTreeMap<String, BTreeSet<(String, String)>> = BTreeMap::new();
        for list in self.all_of(Kind::TermrefList) {
            let part = self.part_of(list)?;
            if self.to_be_skipped(part) {
                continue;
            }
            let info = self.part_info(part)?;
            let Some(Value::Set(terms)) = self.element(list).value() else {
                continue;
            };
            for term in terms {
                references
                    .entry(term.clone())
                    .or_default()
                    .insert((info.title.clone(), info.outputfile.clone()));
            }
        }
        let mut html = String::from("\n<h2 id='term-index'>Term index</h2>\n<dl class='termindex'>\n");
        for (term, parts) in &references {
            let links: Vec<String> = parts
                .iter()
                .map(|(title, outputfile)| format!("<a href='{outputfile}'>{}</a>", escape_html(title)))
                .collect();
            html.push_str(&format!(
                "<dt id='{}'>{}</dt>\n<dd>{}</dd>\n",
                term_anchor(term),
                escape_html(term),
                links.join(", ")
            ));
        }
        html.push_str("</dl>\n");
        Ok(html)
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a mapping",
    }
}
