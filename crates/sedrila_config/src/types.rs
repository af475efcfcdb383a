//! Configuration types deserialized from `sedrila.toml`.

use crate::error::ConfigError;
use serde::Deserialize;

/// The top-level configuration parsed from `sedrila.toml`.
///
/// Contains the course metadata, the ordered chapter/taskgroup structure, and
/// the build settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseConfig {
    /// Course metadata (title, stages, directories).
    pub course: CourseMeta,
    /// Build settings (target layout, cache file, stage filter).
    #[serde(default)]
    pub build: BuildConfig,
    /// The chapters, in publication order.
    #[serde(default)]
    pub chapters: Vec<ChapterConfig>,
}

/// Course metadata required in every `sedrila.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseMeta {
    /// The full course title.
    pub title: String,
    /// A short title, used in breadcrumbs and as the course part's name.
    pub shorttitle: String,
    /// Allowed values of a part's `stage:`, from least to most mature.
    #[serde(default)]
    pub stages: Vec<String>,
    /// Directory holding the chapter tree, relative to the config file.
    #[serde(default = "default_chapterdir")]
    pub chapterdir: String,
    /// Directory whose files are copied verbatim into both target dirs.
    #[serde(default)]
    pub baseresourcedir: Option<String>,
}

/// Build settings controlling the output layout.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Name of the instructor subdirectory of the target directory.
    #[serde(default = "default_instructor_dir")]
    pub instructor_dir: String,
    /// File name of the build cache inside the instructor directory.
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
    /// Lowest stage still included in the output; empty means only parts without stage.
    #[serde(default)]
    pub include_stage: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            instructor_dir: default_instructor_dir(),
            cache_file: default_cache_file(),
            include_stage: String::new(),
        }
    }
}

/// One chapter of the course.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterConfig {
    /// Directory name below `chapterdir` and part name.
    pub slug: String,
    /// Fallback title if the chapter's topmatter has none.
    #[serde(default)]
    pub title: Option<String>,
    /// Maturity stage of the whole chapter.
    #[serde(default)]
    pub stage: Option<String>,
    /// The taskgroups, in publication order.
    #[serde(default)]
    pub taskgroups: Vec<TaskgroupConfig>,
}

/// One taskgroup of a chapter.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskgroupConfig {
    /// Directory name below the chapter directory and part name.
    pub slug: String,
    /// Fallback title if the taskgroup's topmatter has none.
    #[serde(default)]
    pub title: Option<String>,
    /// Maturity stage of the whole taskgroup.
    #[serde(default)]
    pub stage: Option<String>,
}

fn default_chapterdir() -> String {
    "ch".to_string()
}

fn default_instructor_dir() -> String {
    "instructor".to_string()
}

fn default_cache_file() -> String {
    ".sedrila_cache".to_string()
}

impl CourseConfig {
    /// Position of `stage` in `course.stages`, if declared.
    pub fn stage_index(&self, stage: &str) -> Option<usize> {
        self.course.stages.iter().position(|s| s == stage)
    }

    /// Index of the lowest included stage; `stages.len()` when only
    /// stage-less parts are included.
    pub fn include_stage_index(&self) -> usize {
        if self.build.include_stage.is_empty() {
            return self.course.stages.len();
        }
        self.stage_index(&self.build.include_stage)
            .unwrap_or(self.course.stages.len())
    }

    /// Whether a part with the given (already validated) stage is left out of the output.
    pub fn excludes_stage(&self, stage: &str) -> bool {
        match self.stage_index(stage) {
            Some(index) => self.include_stage_index() > index,
            None => false,
        }
    }

    /// Replaces `build.include_stage`, validating it against the declared stages.
    pub fn set_include_stage(&mut self, stage: &str) -> Result<(), ConfigError> {
        if !stage.is_empty() && self.stage_index(stage).is_none() {
            return Err(ConfigError::UnknownStage {
                stage: stage.to_string(),
                allowed: self.course.stages.clone(),
            });
        }
        self.build.include_stage = stage.to_string();
        Ok(())
    }
}
