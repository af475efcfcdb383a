//! `author` runs: one complete incremental build of a course.
//!
//! A run goes through these steps:
//! 1. Load and validate the configuration
//! 2. Prepare the target directories
//! 3. Open the cache
//! 4. Register the course
//! 5. Build every element
//! 6. Write `course.json`
//! 7. Purge files no output produced
//! 8. Drop cache entries of elements that no longer exist
//! 9. Close the cache
//!
//! Any `Err` before step 9 drops the cache unclosed, so the next run sees
//! the previous run's state again.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sedrila_cache::{CacheStore, State};
use sedrila_common::{InternalError, SedrilaResult};
use sedrila_diagnostics::{Diagnostic, Severity};
use serde::Serialize;
use walkdir::WalkDir;

use crate::course::CourseBuilder;
use crate::directory::{Directory, Settings};
use crate::element::ElementId;
use crate::error::BuildError;
use crate::kind::Kind;

/// Name of the course metadata file written into both target directories.
pub const METADATA_FILE: &str = "course.json";

/// Parameters of an author run.
#[derive(Debug, Clone)]
pub struct AuthorOptions {
    /// Directory the course paths are relative to.
    pub course_dir: PathBuf,
    /// Configuration file; defaults to `sedrila.toml` in `course_dir`.
    pub config_file: Option<PathBuf>,
    /// Target directory of the student variant.
    pub targetdir: PathBuf,
    /// Ignore the cache and rebuild everything.
    pub clean: bool,
    /// Overrides `build.include_stage`.
    pub include_stage: Option<String>,
    /// Start instant of the run; defaults to now.
    pub start_time: Option<SystemTime>,
}

impl AuthorOptions {
    /// Options for a normal incremental run.
    pub fn new(course_dir: impl Into<PathBuf>, targetdir: impl Into<PathBuf>) -> Self {
        Self {
            course_dir: course_dir.into(),
            config_file: None,
            targetdir: targetdir.into(),
            clean: false,
            include_stage: None,
            start_time: None,
        }
    }
}

/// Outcome of one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementReport {
    /// The element's kind.
    pub kind: Kind,
    /// The element's name.
    pub name: String,
    /// State after the build.
    pub state: State,
}

/// Outcome of an author run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Every element, in build order.
    pub elements: Vec<ElementReport>,
    /// Files written, in order.
    pub files_written: Vec<PathBuf>,
    /// Leftover files deleted from the target directories.
    pub files_removed: Vec<PathBuf>,
    /// Content problems found.
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    /// The final state of the element of `kind` called `name`.
    pub fn state_of(&self, kind: Kind, name: &str) -> Option<State> {
        self.elements
            .iter()
            .find(|e| e.kind == kind && e.name == name)
            .map(|e| e.state)
    }

    /// How many elements of `kind` ended in `state`.
    pub fn count(&self, kind: Kind, state: State) -> usize {
        self.elements
            .iter()
            .filter(|e| e.kind == kind && e.state == state)
            .count()
    }

    /// Number of error diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    }

    /// Number of warning diagnostics.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    /// Whether any error diagnostic was reported.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Performs one author run.
pub fn run_author(options: &AuthorOptions) -> Result<BuildReport, BuildError> {
    let mut config = match &options.config_file {
        Some(file) => sedrila_config::load_config_file(file)?,
        None => sedrila_config::load_config(&options.course_dir)?,
    };
    if let Some(stage) = &options.include_stage {
        config.set_include_stage(stage)?;
    }
    let mut settings = Settings::new(config, &options.course_dir, &options.targetdir);
    if let Some(file) = &options.config_file {
        settings = settings.with_config_file(file);
    }
    prepare_targetdirs(&settings)?;

    let start = options.start_time.unwrap_or_else(SystemTime::now);
    let cache = CacheStore::open_at(Some(&settings.cache_file()), options.clean, start)?;
    tracing::info!(
        target: "sedrila.build",
        course = %settings.config.course.title,
        targetdir = %settings.student_dir.display(),
        clean = options.clean,
        "author run"
    );

    let mut directory = Directory::new(cache, settings);
    CourseBuilder::new(&mut directory).register()?;
    directory.run_build()?;
    write_metadata(&mut directory)?;
    let files_removed = purge_leftovers(&directory)?;
    directory.prune_cache();

    let elements = Kind::ALL
        .into_iter()
        .flat_map(|kind| directory.all_of(kind).collect::<Vec<_>>())
        .map(|id| {
            let element = directory.element(id);
            ElementReport {
                kind: element.kind,
                name: element.name.clone(),
                state: element.state,
            }
        })
        .collect();
    let (cache, sink, files_written) = directory.finish();
    cache.close()?;
    let report = BuildReport {
        elements,
        files_written,
        files_removed,
        diagnostics: sink.take_all(),
    };
    tracing::info!(
        target: "sedrila.build",
        written = report.files_written.len(),
        removed = report.files_removed.len(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        "author run finished"
    );
    Ok(report)
}

/// Refuses to write into a non-empty directory that holds no earlier build.
fn prepare_targetdirs(settings: &Settings) -> Result<(), BuildError> {
    let student = &settings.student_dir;
    let target_error = |path: &Path, reason: String| BuildError::TargetDir {
        path: path.to_path_buf(),
        reason,
    };
    if student.is_dir() {
        let mut entries = std::fs::read_dir(student).map_err(|e| target_error(student, e.to_string()))?;
        let non_empty = entries.next().is_some();
        if non_empty && !student.join(METADATA_FILE).exists() {
            return Err(target_error(
                student,
                format!("not empty and contains no {METADATA_FILE}"),
            ));
        }
    }
    for dir in [student, &settings.instructor_dir] {
        std::fs::create_dir_all(dir).map_err(|e| target_error(dir, e.to_string()))?;
    }
    // Claim the directory now, so a run that fails midway does not lock
    // out the next one.
    let marker = student.join(METADATA_FILE);
    if !marker.exists() {
        let course = &settings.config.course;
        let placeholder = CourseMetadata {
            title: &course.title,
            shorttitle: &course.shorttitle,
            stages: &course.stages,
            chapters: Vec::new(),
        };
        let json = serde_json::to_string_pretty(&placeholder).map_err(|e| target_error(&marker, e.to_string()))?;
        std::fs::write(&marker, json).map_err(|e| target_error(&marker, e.to_string()))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct PartMetadata {
    slug: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
    #[serde(flatten)]
    task: Option<TaskMetadata>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parts: Vec<PartMetadata>,
}

#[derive(Serialize)]
struct TaskMetadata {
    timevalue: Option<f64>,
    difficulty: Option<u8>,
    assumes: Vec<String>,
    requires: Vec<String>,
}

#[derive(Serialize)]
struct CourseMetadata<'a> {
    title: &'a str,
    shorttitle: &'a str,
    stages: &'a [String],
    chapters: Vec<PartMetadata>,
}

impl Directory {
    fn part_metadata(&self, part: ElementId) -> SedrilaResult<PartMetadata> {
        let info = self.part_info(part)?;
        let parts = self
            .ordered_children(part)
            .into_iter()
            .filter(|child| !self.to_be_skipped(*child))
            .map(|child| self.part_metadata(child))
            .collect::<SedrilaResult<Vec<_>>>()?;
        let task = info.task.as_ref().map(|task| TaskMetadata {
            timevalue: task.timevalue,
            difficulty: task.difficulty,
            assumes: task.assumes.clone(),
            requires: task.requires.clone(),
        });
        Ok(PartMetadata {
            slug: info.slug.clone(),
            title: info.title.clone(),
            stage: info.stage.clone(),
            task,
            parts,
        })
    }
}

/// Writes the published course structure to both target directories,
/// leaving files with identical content alone.
fn write_metadata(directory: &mut Directory) -> SedrilaResult<()> {
    let Some(course) = directory.course_part() else {
        return Ok(());
    };
    let chapters = directory.part_metadata(course)?.parts;
    let config = &directory.settings().config.course;
    let metadata = CourseMetadata {
        title: &config.title,
        shorttitle: &config.shorttitle,
        stages: &config.stages,
        chapters,
    };
    let mut json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| InternalError::new(format!("cannot serialize {METADATA_FILE}: {e}")))?;
    json.push('\n');
    let settings = directory.settings();
    let targets = [
        settings.student_dir.join(METADATA_FILE),
        settings.instructor_dir.join(METADATA_FILE),
    ];
    for target in targets {
        let current = std::fs::read_to_string(&target).ok();
        if current.as_deref() != Some(json.as_str()) {
            directory.write_output(&target, json.as_bytes())?;
        }
    }
    Ok(())
}

/// Deletes files in the target directories that no output of this run
/// accounts for, such as pages of removed or stage-filtered parts.
fn purge_leftovers(directory: &Directory) -> SedrilaResult<Vec<PathBuf>> {
    let settings = directory.settings();
    let mut keep: BTreeSet<PathBuf> = directory
        .all_outputs()
        .filter(|id| !(directory.element(*id).kind.is_page() && directory.to_be_skipped(*id)))
        .flat_map(|id| directory.output_files(id))
        .collect();
    let cache_file = settings.cache_file();
    let mut cache_tmp = cache_file.clone().into_os_string();
    cache_tmp.push(".tmp");
    keep.extend([
        settings.student_dir.join(METADATA_FILE),
        settings.instructor_dir.join(METADATA_FILE),
        cache_file,
        PathBuf::from(cache_tmp),
    ]);

    let mut removed = Vec::new();
    for root in [&settings.student_dir, &settings.instructor_dir] {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| root == &settings.instructor_dir || e.path() != settings.instructor_dir);
        for entry in walker {
            let entry = entry.map_err(|e| InternalError::new(format!("cannot walk {}: {e}", root.display())))?;
            if !entry.file_type().is_file() || keep.contains(entry.path()) {
                continue;
            }
            std::fs::remove_file(entry.path()).map_err(|e| InternalError::io(entry.path(), e))?;
            tracing::info!(target: "sedrila.build", file = %entry.path().display(), "removed leftover");
            removed.push(entry.path().to_path_buf());
        }
    }
    Ok(removed)
}
