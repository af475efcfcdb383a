//! Course structure: metadata derivation, stage filtering and navigation.

use sedrila_cache::{State, Value};
use sedrila_common::{InternalError, SedrilaResult};
use sedrila_diagnostics::DiagnosticCode;

use crate::directory::Directory;
use crate::element::{ElementId, PartInfo};
use crate::kind::Kind;
use crate::tasks::{self, TaskInfo};
use crate::template::escape_html;

impl Directory {
    /// The course structure data of `part`.
    pub(crate) fn part_info(&self, part: ElementId) -> SedrilaResult<&PartInfo> {
        let element = self.element(part);
        element
            .part_info()
            .ok_or_else(|| InternalError::new(format!("{element} is not a part")))
    }

    pub(crate) fn part_info_mut_of(&mut self, part: ElementId) -> SedrilaResult<&mut PartInfo> {
        let element = self.element_mut(part);
        let label = element.to_string();
        element
            .part_info_mut()
            .ok_or_else(|| InternalError::new(format!("{label} is not a part")))
    }

    /// The course part, once registered.
    pub(crate) fn course_part(&self) -> Option<ElementId> {
        self.all_of(Kind::Course).next()
    }

    /// Whether `part` or any part enclosing it is filtered out by stage.
    pub fn to_be_skipped(&self, part: ElementId) -> bool {
        let mut current = Some(part);
        while let Some(id) = current {
            match self.element(id).part_info() {
                Some(info) if info.skip => return true,
                Some(info) => current = info.parent,
                None => return false,
            }
        }
        false
    }

    /// `part` followed by its enclosing parts up to the course.
    fn structure_path(&self, part: ElementId) -> Vec<ElementId> {
        let mut path = Vec::new();
        let mut current = Some(part);
        while let Some(id) = current {
            path.push(id);
            current = self.element(id).part_info().and_then(|info| info.parent);
        }
        path
    }

    /// Copies title and stage from the topmatter into the part and decides
    /// whether the part is skipped. Tasks also get their task attributes.
    ///
    /// The topmatter wins over the configuration; the title falls back to
    /// the slug. Only the first word of a stage counts.
    pub(crate) fn derive_metadata(&mut self, id: ElementId) -> SedrilaResult<()> {
        let part = self.part_of(id)?;
        let topmatter = self.sibling(id, Kind::Topmatter)?;
        let is_task = self.element(part).kind == Kind::Task;
        let mut task_problems = Vec::new();
        let (title, raw_stage, task) = match self.element(topmatter).value() {
            Some(Value::Map(map)) => (
                map.get("title").and_then(|v| v.as_str()).map(str::to_string),
                map.get("stage").and_then(|v| v.as_str()).map(str::to_string),
                is_task.then(|| {
                    let (task, problems) = tasks::task_info_from(map);
                    task_problems = problems;
                    task
                }),
            ),
            _ => (None, None, is_task.then(TaskInfo::default)),
        };
        let info = self.part_info(part)?;
        let title = title
            .or_else(|| info.configured_title.clone())
            .unwrap_or_else(|| info.slug.clone());
        let stage = raw_stage
            .or_else(|| info.configured_stage.clone())
            .as_deref()
            .and_then(stage_word);
        let sourcefile = info.sourcefile.clone();

        let config = &self.settings().config;
        let (skip, unknown_stage) = match stage.as_deref() {
            None => (false, false),
            Some(word) if config.stage_index(word).is_none() => (false, true),
            Some(word) => (config.excludes_stage(word), false),
        };
        if let (true, Some(word)) = (unknown_stage, stage.as_deref()) {
            let allowed = config.course.stages.join(", ");
            self.report_error(
                DiagnosticCode::UNKNOWN_STAGE,
                format!("unknown stage '{word}'; allowed are: {allowed}"),
                &sourcefile,
            );
        }
        for (code, message) in task_problems {
            self.report_error(code, message, &sourcefile);
        }
        tracing::debug!(
            target: "sedrila.build",
            part = %self.element(part),
            title = %title,
            stage = stage.as_deref().unwrap_or(""),
            skip,
            "derived metadata"
        );
        let info = self.part_info_mut_of(part)?;
        info.title = title;
        info.stage = stage;
        info.skip = skip;
        info.task = task;
        Ok(())
    }

    /// Links from the course down to `part`, ending in the part's own title.
    pub(crate) fn breadcrumb(&self, part: ElementId) -> String {
        let mut path = self.structure_path(part);
        path.reverse();
        let last = path.len().saturating_sub(1);
        path.iter()
            .enumerate()
            .filter_map(|(i, id)| self.element(*id).part_info().map(|info| (i, info)))
            .map(|(i, info)| {
                if i == last {
                    format!("<span>{}</span>", escape_html(&info.title))
                } else {
                    format!("<a href='{}'>{}</a>", info.outputfile, escape_html(&info.title))
                }
            })
            .collect::<Vec<_>>()
            .join(" &gt; ")
    }

    /// The table-of-contents entry of `part`; empty for skipped parts.
    fn tocline_html(&self, part: ElementId) -> String {
        let element = self.element(part);
        let Some(info) = element.part_info() else {
            return String::new();
        };
        if self.to_be_skipped(part) {
            return String::new();
        }
        let classes = match &info.stage {
            Some(stage) => format!("stage-{stage}"),
            None => "no-stage".to_string(),
        };
        let title = escape_html(&info.title);
        let decoration = info.task.as_ref().map(tasks::tocline_decoration).unwrap_or_default();
        format!(
            "<div class='indent{} {classes}'><a href='{}' title='{title}'>{title}</a>{decoration}</div>",
            element.kind.toc_level(),
            info.outputfile,
        )
    }

    /// Recomputes a tocline and compares it with the cached one.
    pub(crate) fn check_tocline(&mut self, id: ElementId) -> SedrilaResult<()> {
        let part = self.part_of(id)?;
        let fresh = Value::Scalar(self.tocline_html(part));
        let (cached, _) = self.cache.read_with_state(&self.element(id).cache_key());
        let state = match cached {
            None => State::Missing,
            Some(old) if old == fresh => State::Unchanged,
            Some(_) => State::Changed,
        };
        let element = self.element_mut(id);
        element.value = Some(fresh);
        element.state = state;
        Ok(())
    }

    fn tocline_of(&self, part: ElementId) -> Option<&str> {
        let name = &self.element(part).name;
        self.get(Kind::Tocline, name)
            .map(|id| self.element(id).scalar())
            .filter(|line| !line.is_empty())
    }

    /// The table of contents shown on `part`'s page.
    ///
    /// The course page lists everything. Other pages list all chapters but
    /// expand only the chapter and taskgroup on their own path. Taskgroups
    /// without any remaining task are left out. Tasks appear in task order.
    pub(crate) fn toc_html(&self, part: ElementId) -> String {
        let path = self.structure_path(part);
        let Some(course) = self.course_part() else {
            return String::new();
        };
        let full = path.len() == 1;
        let mut lines = vec![String::new()];
        let children = |id: ElementId| self.ordered_children(id);
        for chapter in children(course) {
            if self.element(chapter).kind != Kind::Chapter || self.to_be_skipped(chapter) {
                continue;
            }
            lines.extend(self.tocline_of(chapter).map(str::to_string));
            if !full && !path.contains(&chapter) {
                continue;
            }
            for taskgroup in children(chapter) {
                let tasks: Vec<ElementId> = children(taskgroup)
                    .into_iter()
                    .filter(|task| !self.to_be_skipped(*task))
                    .collect();
                if self.to_be_skipped(taskgroup) || tasks.is_empty() {
                    continue;
                }
                lines.extend(self.tocline_of(taskgroup).map(str::to_string));
                if !full && !path.contains(&taskgroup) {
                    continue;
                }
                lines.extend(tasks.iter().filter_map(|task| self.tocline_of(*task)).map(str::to_string));
            }
        }
        if let Some(glossary) = self.all_of(Kind::Glossary).next() {
            lines.extend(self.tocline_of(glossary).map(str::to_string));
        }
        lines.join("\n")
    }

    pub(crate) fn build_toc(&mut self, id: ElementId) -> SedrilaResult<()> {
        let part = self.part_of(id)?;
        let html = self.toc_html(part);
        self.commit_built_value(id, Value::Scalar(html));
        Ok(())
    }
}

/// The first word of a stage value: `"beta (unfinished)"` is stage `beta`.
fn stage_word(stage: &str) -> Option<String> {
    stage
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .find(|word| !word.is_empty())
        .map(str::to_string)
}
