//! The element registry and build orchestrator.

use std::collections::HashMap;
use std::ops::Index;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use sedrila_cache::CacheStore;
use sedrila_common::SedrilaResult;
use sedrila_config::CourseConfig;
use sedrila_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};

use crate::element::{Detail, Element, ElementId};
use crate::kind::{Kind, Role};
use crate::render::{MarkdownRenderer, Renderer};
use crate::template::{DefaultTemplate, PageTemplate};

/// Where a build reads from and writes to.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The validated course configuration.
    pub config: CourseConfig,
    /// Directory containing `sedrila.toml`; course paths are relative to it.
    pub course_dir: PathBuf,
    /// Target directory of the student variant.
    pub student_dir: PathBuf,
    /// Target directory of the instructor variant.
    pub instructor_dir: PathBuf,
    /// The configuration file; every page depends on it.
    pub config_file: PathBuf,
}

impl Settings {
    /// Derives the target layout from the configuration.
    pub fn new(config: CourseConfig, course_dir: impl Into<PathBuf>, targetdir: impl Into<PathBuf>) -> Self {
        let course_dir = course_dir.into();
        let student_dir = targetdir.into();
        let instructor_dir = student_dir.join(&config.build.instructor_dir);
        let config_file = course_dir.join(sedrila_config::CONFIG_FILENAME);
        Self {
            config,
            course_dir,
            student_dir,
            instructor_dir,
            config_file,
        }
    }

    /// Uses `config_file` instead of `sedrila.toml` in the course directory.
    pub fn with_config_file(mut self, config_file: impl Into<PathBuf>) -> Self {
        self.config_file = config_file.into();
        self
    }

    /// The directory holding the chapter tree.
    pub fn chapter_dir(&self) -> PathBuf {
        self.course_dir.join(&self.config.course.chapterdir)
    }

    /// The cache's backing file.
    pub fn cache_file(&self) -> PathBuf {
        self.instructor_dir.join(&self.config.build.cache_file)
    }
}

/// Registry of all elements of a run, grouped by kind.
///
/// The directory owns every element; elements refer to each other by
/// [`ElementId`]. Within a kind, elements are kept in insertion order, which
/// is also their build order.
pub struct Directory {
    elements: Vec<Element>,
    by_kind: Vec<IndexMap<String, ElementId>>,
    pub(crate) cache: CacheStore,
    sink: DiagnosticSink,
    settings: Settings,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) template: Box<dyn PageTemplate>,
    pub(crate) files_written: Vec<PathBuf>,
    pub(crate) task_rank: HashMap<ElementId, usize>,
}

impl Directory {
    /// Creates an empty directory using the bundled renderer and template.
    pub fn new(cache: CacheStore, settings: Settings) -> Self {
        Self {
            elements: Vec::new(),
            by_kind: Kind::ALL.iter().map(|_| IndexMap::new()).collect(),
            cache,
            sink: DiagnosticSink::new(),
            settings,
            renderer: Box::new(MarkdownRenderer::new()),
            template: Box::new(DefaultTemplate),
            files_written: Vec::new(),
            task_rank: HashMap::new(),
        }
    }

    /// Replaces the Markdown renderer.
    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Replaces the page template.
    pub fn with_template(mut self, template: impl PageTemplate + 'static) -> Self {
        self.template = Box::new(template);
        self
    }

    /// The cache store of this run.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Build settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Diagnostics reported so far.
    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    /// Output files written during this run.
    pub fn files_written(&self) -> &[PathBuf] {
        &self.files_written
    }

    /// Looks up the element of `kind` called `name`.
    pub fn get(&self, kind: Kind, name: &str) -> Option<ElementId> {
        self.by_kind[kind.index()].get(name).copied()
    }

    /// The element with the given ID.
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.index()]
    }

    /// Creates and registers an element.
    ///
    /// Replacing an existing entry of the same kind and name is allowed and
    /// only logged. A posthoc source file is recorded in the cache right away,
    /// so that the next run does not mistake it for a new file.
    pub fn make(&mut self, kind: Kind, name: &str, detail: Detail) -> ElementId {
        if let Detail::File { path, posthoc: true } = &detail {
            let key = kind.cache_key(name);
            self.cache.record_path(path, &key);
        }
        let id = ElementId::from_raw(self.elements.len() as u32);
        self.elements.push(Element::new(kind, name, detail));
        if self.by_kind[kind.index()].insert(name.to_string(), id).is_some() {
            tracing::debug!(target: "sedrila.build", kind = kind.tag(), name, "replacing registered element");
        }
        id
    }

    /// Returns the registered element, creating it if needed.
    pub fn make_or_get(&mut self, kind: Kind, name: &str, detail: Detail) -> ElementId {
        match self.get(kind, name) {
            Some(id) => id,
            None => self.make(kind, name, detail),
        }
    }

    /// Declares that `id` depends on `dependency`.
    pub fn add_dependency(&mut self, id: ElementId, dependency: ElementId) {
        debug_assert!(
            self.element(dependency).kind < self.element(id).kind,
            "dependency {} does not precede {}",
            self.element(dependency),
            self.element(id)
        );
        self.element_mut(id).dependencies.push(dependency);
    }

    /// Builds every registered element, kind by kind in build order.
    ///
    /// Elements registered during the pass are built too when their kind
    /// has not been passed yet.
    pub fn run_build(&mut self) -> SedrilaResult<()> {
        for kind in Kind::ALL {
            tracing::debug!(
                target: "sedrila.build",
                kind = kind.tag(),
                count = self.by_kind[kind.index()].len(),
                "building kind"
            );
            let mut position = 0;
            while let Some((_, &id)) = self.by_kind[kind.index()].get_index(position) {
                self.build(id)?;
                position += 1;
            }
        }
        Ok(())
    }

    /// All registered elements of `kind`, in insertion order.
    pub fn all_of(&self, kind: Kind) -> impl Iterator<Item = ElementId> + '_ {
        self.by_kind[kind.index()].values().copied()
    }

    /// The elements called `name`, across all kinds.
    pub fn all_named(&self, name: &str) -> Vec<ElementId> {
        Kind::ALL
            .iter()
            .filter_map(|kind| self.get(*kind, name))
            .collect()
    }

    /// Every output file element, in build order.
    pub fn all_outputs(&self) -> impl Iterator<Item = ElementId> + '_ {
        Kind::ALL
            .into_iter()
            .filter(|kind| kind.role() == Role::Outputfile)
            .flat_map(move |kind| self.all_of(kind))
    }

    /// The part (page or zipfile) called `name`, if any.
    pub fn part_named(&self, name: &str) -> Option<ElementId> {
        Kind::ALL
            .iter()
            .filter(|kind| kind.is_part())
            .find_map(|kind| self.get(*kind, name))
    }

    /// Emits a diagnostic and marks every file it names dirty for the next run.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        for file in diagnostic.files() {
            self.cache.mark_dirty(file);
        }
        self.sink.emit(diagnostic);
    }

    /// Reports an error about `file`.
    pub fn report_error(&mut self, code: DiagnosticCode, message: impl Into<String>, file: &Path) {
        self.report(Diagnostic::error(code, message).in_file(file));
    }

    /// Reports a warning about `file`.
    pub fn report_warning(&mut self, code: DiagnosticCode, message: impl Into<String>, file: &Path) {
        self.report(Diagnostic::warning(code, message).in_file(file));
    }

    /// Drops cache entries of elements not registered in this run, such as
    /// those of removed parts or dropped includes.
    pub fn prune_cache(&mut self) -> usize {
        let live: std::collections::HashSet<String> =
            self.elements.iter().map(Element::cache_key).collect();
        self.cache.retain_persisted(|key| live.contains(key))
    }

    /// Dissolves the directory into the cache (to be closed), the diagnostics
    /// and the list of written files.
    pub fn finish(self) -> (CacheStore, DiagnosticSink, Vec<PathBuf>) {
        (self.cache, self.sink, self.files_written)
    }
}

impl Index<ElementId> for Directory {
    type Output = Element;

    fn index(&self, id: ElementId) -> &Element {
        self.element(id)
    }
}
