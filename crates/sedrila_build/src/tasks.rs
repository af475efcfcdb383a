//! Task attributes and the links between tasks.
//!
//! A task names the tasks or taskgroups it builds on in `assumes` (knowledge
//! taken for granted) and `requires` (results reused). Once every topmatter
//! has been read, the links are checked and inverted, and the tasks are put
//! into one course-wide order in which each task follows the tasks it
//! depends on. Tables of contents list tasks in that order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sedrila_common::SedrilaResult;
use sedrila_diagnostics::{Diagnostic, DiagnosticCode};
use serde_json::Value as Json;

use crate::directory::Directory;
use crate::element::ElementId;
use crate::kind::Kind;
use crate::template::escape_html;

/// Names of difficulty levels 1 to 4.
pub const DIFFICULTY_LEVELS: [&str; 4] = ["verylow", "low", "medium", "high"];

/// Task attributes from the topmatter, plus the inverse links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskInfo {
    /// Expected working time in hours.
    pub timevalue: Option<f64>,
    /// Difficulty level from 1 to 4.
    pub difficulty: Option<u8>,
    /// Tasks or taskgroups whose knowledge this task assumes.
    pub assumes: Vec<String>,
    /// Tasks or taskgroups whose results this task reuses.
    pub requires: Vec<String>,
    /// Tasks that assume this one.
    pub assumed_by: Vec<String>,
    /// Tasks that require this one.
    pub required_by: Vec<String>,
}

#[derive(Clone, Copy)]
enum Link {
    Assumes,
    Requires,
}

impl Link {
    fn label(self) -> &'static str {
        match self {
            Link::Assumes => "assumed",
            Link::Requires => "required",
        }
    }
}

/// Reads the task attributes of a topmatter.
///
/// Returns the problems found alongside; attributes with problems are left
/// empty.
pub(crate) fn task_info_from(topmatter: &BTreeMap<String, Json>) -> (TaskInfo, Vec<(DiagnosticCode, String)>) {
    let mut problems = Vec::new();
    let mut required = |name: &str| {
        let value = topmatter.get(name).filter(|v| !v.is_null());
        if value.is_none() {
            problems.push((
                DiagnosticCode::MISSING_ATTRIBUTE,
                format!("missing required attribute '{name}'"),
            ));
        }
        value
    };
    let difficulty = required("difficulty");
    let timevalue = required("timevalue");

    let difficulty = difficulty.and_then(|value| {
        let level = value
            .as_u64()
            .filter(|n| (1..=DIFFICULTY_LEVELS.len() as u64).contains(n))
            .and_then(|n| u8::try_from(n).ok());
        if level.is_none() {
            problems.push((
                DiagnosticCode::BAD_ATTRIBUTE,
                format!("'difficulty' must be an integer from 1 to {}, not {value}", DIFFICULTY_LEVELS.len()),
            ));
        }
        level
    });
    let timevalue = timevalue.and_then(|value| {
        let hours = value.as_f64().filter(|h| *h >= 0.0);
        if hours.is_none() {
            problems.push((
                DiagnosticCode::BAD_ATTRIBUTE,
                format!("'timevalue' must be a non-negative number, not {value}"),
            ));
        }
        hours
    });
    let mut names = |attr: &str| match topmatter.get(attr) {
        None | Some(Json::Null) => Vec::new(),
        Some(Json::String(text)) => split_names(text),
        Some(Json::Array(items)) if items.iter().all(Json::is_string) => {
            items.iter().filter_map(Json::as_str).flat_map(split_names).collect()
        }
        Some(other) => {
            problems.push((
                DiagnosticCode::BAD_ATTRIBUTE,
                format!("'{attr}' must be a comma-separated string or a list of names, not {other}"),
            ));
            Vec::new()
        }
    };
    let assumes = names("assumes");
    let requires = names("requires");
    let info = TaskInfo {
        timevalue,
        difficulty,
        assumes,
        requires,
        ..TaskInfo::default()
    };
    (info, problems)
}

fn split_names(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// The tocline suffix of a task: difficulty symbol, timevalue and link
/// markers. The marker labels come from the stylesheet.
pub(crate) fn tocline_decoration(task: &TaskInfo) -> String {
    let mut html = String::new();
    if let Some(level) = task.difficulty {
        let name = DIFFICULTY_LEVELS
            .get(usize::from(level).saturating_sub(1))
            .copied()
            .unwrap_or("unknown");
        html.push_str(&format!(
            " <span class='difficulty{level}' title='Difficulty: {name}'>&#x25A0;</span>"
        ));
    }
    if let Some(hours) = task.timevalue {
        html.push_str(&format!(
            " <span class='timevalue-decoration' title='Timevalue: {hours} hours'>{hours}</span>"
        ));
    }
    let refs = [
        ("assumed-by", "assumed by", &task.assumed_by),
        ("required-by", "required by", &task.required_by),
        ("assumes", "assumes", &task.assumes),
        ("requires", "requires", &task.requires),
    ];
    for (class, label, names) in refs {
        if !names.is_empty() {
            html.push_str(&format!(
                "<span class='{class}-decoration' title='{label}: {}'></span>",
                escape_html(&names.join(", "))
            ));
        }
    }
    html
}

impl Directory {
    /// Checks and inverts the `assumes`/`requires` links of all tasks and
    /// computes the course-wide task order.
    pub(crate) fn link_tasks(&mut self, _id: ElementId) -> SedrilaResult<()> {
        let tasks: Vec<ElementId> = self.all_of(Kind::Task).collect();
        let mut links = Vec::new();
        for &task in &tasks {
            let info = self.part_info_mut_of(task)?;
            if let Some(attrs) = info.task.as_mut() {
                attrs.assumed_by.clear();
                attrs.required_by.clear();
                links.extend(attrs.assumes.iter().map(|target| (task, Link::Assumes, target.clone())));
                links.extend(attrs.requires.iter().map(|target| (task, Link::Requires, target.clone())));
            }
        }

        let mut predecessors: HashMap<ElementId, BTreeSet<ElementId>> =
            tasks.iter().map(|task| (*task, BTreeSet::new())).collect();
        for (task, link, target) in links {
            let slug = self.element(task).name.clone();
            match self.get(Kind::Task, &target) {
                Some(other) => {
                    if let Some(attrs) = self.part_info_mut_of(other)?.task.as_mut() {
                        match link {
                            Link::Assumes => attrs.assumed_by.push(slug),
                            Link::Requires => attrs.required_by.push(slug),
                        }
                    }
                    predecessors.entry(task).or_default().insert(other);
                }
                None if self.get(Kind::Taskgroup, &target).is_some() => {}
                None => {
                    let file = self.part_info(task)?.sourcefile.clone();
                    self.report_error(
                        DiagnosticCode::UNKNOWN_TASK_REFERENCE,
                        format!("{} task or taskgroup '{target}' does not exist", link.label()),
                        &file,
                    );
                }
            }
        }

        let order = self.order_tasks(tasks, predecessors)?;
        tracing::debug!(target: "sedrila.build", tasks = order.len(), "linked tasks");
        self.task_rank = order.into_iter().enumerate().map(|(rank, task)| (task, rank)).collect();
        Ok(())
    }

    /// Topological order in layers; within a layer, easier tasks first, then
    /// by slug. Tasks caught in a cycle are reported and appended.
    fn order_tasks(
        &mut self,
        mut pending: Vec<ElementId>,
        mut predecessors: HashMap<ElementId, BTreeSet<ElementId>>,
    ) -> SedrilaResult<Vec<ElementId>> {
        let mut order = Vec::with_capacity(pending.len());
        loop {
            let (mut ready, blocked): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|task| predecessors.get(task).map_or(true, BTreeSet::is_empty));
            pending = blocked;
            if ready.is_empty() {
                break;
            }
            ready.sort_by_key(|task| self.task_sort_key(*task));
            for preds in predecessors.values_mut() {
                for task in &ready {
                    preds.remove(task);
                }
            }
            order.extend(ready);
        }
        if !pending.is_empty() {
            pending.sort_by_key(|task| self.task_sort_key(*task));
            let names: Vec<&str> = pending.iter().map(|task| self.element(*task).name.as_str()).collect();
            let mut diagnostic = Diagnostic::error(
                DiagnosticCode::DEPENDENCY_CYCLE,
                format!("'assumes'/'requires' links form a cycle among: {}", names.join(", ")),
            );
            for task in pending.iter().take(2) {
                let file = self.part_info(*task)?.sourcefile.clone();
                diagnostic = if diagnostic.file.is_none() {
                    diagnostic.in_file(file)
                } else {
                    diagnostic.also_in(file)
                };
            }
            self.report(diagnostic);
            order.extend(pending);
        }
        Ok(order)
    }

    fn task_sort_key(&self, task: ElementId) -> (Option<u8>, String) {
        let element = self.element(task);
        let difficulty = element
            .part_info()
            .and_then(|info| info.task.as_ref())
            .and_then(|attrs| attrs.difficulty);
        (difficulty, element.name.clone())
    }

    /// The children of `part`, tasks in course-wide task order.
    pub(crate) fn ordered_children(&self, part: ElementId) -> Vec<ElementId> {
        let mut children = self
            .element(part)
            .part_info()
            .map(|info| info.children.clone())
            .unwrap_or_default();
        children.sort_by_key(|child| self.task_rank.get(child).copied().unwrap_or(usize::MAX));
        children
    }
}
