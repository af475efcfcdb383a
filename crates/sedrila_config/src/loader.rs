//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::CourseConfig;
use std::collections::HashSet;
use std::path::Path;

/// Conventional name of the configuration file in a course directory.
pub const CONFIG_FILENAME: &str = "sedrila.toml";

/// Loads and validates `sedrila.toml` from a course directory.
pub fn load_config(course_dir: &Path) -> Result<CourseConfig, ConfigError> {
    load_config_file(&course_dir.join(CONFIG_FILENAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<CourseConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<CourseConfig, ConfigError> {
    let config: CourseConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields, slug uniqueness, and stage names.
fn validate_config(config: &CourseConfig) -> Result<(), ConfigError> {
    if config.course.title.is_empty() {
        return Err(ConfigError::MissingField("course.title".to_string()));
    }
    if config.course.shorttitle.is_empty() {
        return Err(ConfigError::MissingField("course.shorttitle".to_string()));
    }
    let check_stage = |stage: &Option<String>| -> Result<(), ConfigError> {
        match stage {
            Some(s) if config.stage_index(s).is_none() => Err(ConfigError::UnknownStage {
                stage: s.clone(),
                allowed: config.course.stages.clone(),
            }),
            _ => Ok(()),
        }
    };
    if !config.build.include_stage.is_empty() {
        check_stage(&Some(config.build.include_stage.clone()))?;
    }
    let mut chapter_slugs = HashSet::new();
    let mut taskgroup_slugs = HashSet::new();
    for chapter in &config.chapters {
        if chapter.slug.is_empty() {
            return Err(ConfigError::MissingField("chapters.slug".to_string()));
        }
        if !chapter_slugs.insert(chapter.slug.as_str()) {
            return Err(ConfigError::DuplicateSlug(chapter.slug.clone()));
        }
        check_stage(&chapter.stage)?;
        for taskgroup in &chapter.taskgroups {
            if taskgroup.slug.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "chapters.{}.taskgroups.slug",
                    chapter.slug
                )));
            }
            if !taskgroup_slugs.insert(taskgroup.slug.as_str()) {
                return Err(ConfigError::DuplicateSlug(taskgroup.slug.clone()));
            }
            check_stage(&taskgroup.stage)?;
        }
    }
    Ok(())
}
