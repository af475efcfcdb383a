//! Registration of a course's parts and their standard dependencies.
//!
//! Layout below the chapter directory:
//!
//! ```text
//! <chapterdir>/index.md                  the course
//! <chapterdir>/glossary.md               the glossary (optional)
//! <chapterdir>/<chapter>/index.md        a chapter
//! <chapterdir>/<chapter>/<tg>/index.md   a taskgroup
//! <chapterdir>/<chapter>/<tg>/<task>.md  a task
//! ```
//!
//! `*.zip` directories next to the course, chapter and taskgroup index files
//! become archives.

use std::path::{Path, PathBuf};

use sedrila_common::{InternalError, SedrilaResult};
use sedrila_config::CourseConfig;
use sedrila_diagnostics::{Diagnostic, DiagnosticCode};
use walkdir::WalkDir;

use crate::directory::Directory;
use crate::element::{Detail, ElementId, PartInfo};
use crate::kind::Kind;

/// Registers every element of a course in a [`Directory`].
pub struct CourseBuilder<'a> {
    directory: &'a mut Directory,
    config: CourseConfig,
    chapter_dir: PathBuf,
    config_source: Option<ElementId>,
}

impl<'a> CourseBuilder<'a> {
    /// Prepares registration into `directory`, using its settings.
    pub fn new(directory: &'a mut Directory) -> Self {
        let config = directory.settings().config.clone();
        let chapter_dir = directory.settings().chapter_dir();
        Self {
            directory,
            config,
            chapter_dir,
            config_source: None,
        }
    }

    /// Registers the course, its chapters, taskgroups, tasks and glossary,
    /// the zip archives and the base resources. Returns the course part.
    pub fn register(mut self) -> SedrilaResult<ElementId> {
        let config_file = self.directory.settings().config_file.clone();
        if config_file.is_file() {
            self.config_source = Some(self.directory.make_or_get(
                Kind::Sourcefile,
                &config_file.to_string_lossy(),
                Detail::File {
                    path: config_file.clone(),
                    posthoc: false,
                },
            ));
        }
        let course_file = self.chapter_dir.join("index.md");
        let mut info = PartInfo::new(&self.config.course.shorttitle, &course_file, "index.html");
        info.configured_title = Some(self.config.course.title.clone());
        let name = self.config.course.shorttitle.clone();
        let course = self.directory.make(Kind::Course, &name, Detail::Part(Box::new(info)));
        self.directory.make(Kind::TaskLinks, &name, Detail::OfPart { part: course });
        self.add_pieces(course, &course_file, true);
        self.add_zipdirs(course, &course_file)?;

        for chapter in self.config.chapters.clone() {
            let dir = self.chapter_dir.join(&chapter.slug);
            let file = dir.join("index.md");
            let Some(chapter_id) = self.add_part(
                Kind::Chapter,
                &chapter.slug,
                &file,
                format!("chapter-{}.html", chapter.slug),
                course,
                chapter.title.clone(),
                chapter.stage.clone(),
            ) else {
                continue;
            };
            self.add_zipdirs(chapter_id, &file)?;
            for taskgroup in &chapter.taskgroups {
                let tg_dir = dir.join(&taskgroup.slug);
                let tg_file = tg_dir.join("index.md");
                let Some(tg_id) = self.add_part(
                    Kind::Taskgroup,
                    &taskgroup.slug,
                    &tg_file,
                    format!("{}.html", taskgroup.slug),
                    chapter_id,
                    taskgroup.title.clone(),
                    taskgroup.stage.clone(),
                ) else {
                    continue;
                };
                self.add_zipdirs(tg_id, &tg_file)?;
                for task_file in task_files(&tg_dir)? {
                    let Some(stem) = task_file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                        continue;
                    };
                    self.add_part(Kind::Task, &stem, &task_file, format!("{stem}.html"), tg_id, None, None);
                }
            }
        }

        let glossary_file = self.chapter_dir.join("glossary.md");
        if glossary_file.is_file() {
            self.add_glossary(course, &glossary_file);
        }
        self.add_base_resources()?;
        tracing::debug!(
            target: "sedrila.build",
            parts = Kind::PAGES.iter().map(|k| self.directory.all_of(*k).count()).sum::<usize>(),
            "registered course"
        );
        Ok(course)
    }

    /// Registers a page part below `parent`; a name that is already taken
    /// is reported and the part ignored.
    #[allow(clippy::too_many_arguments)]
    fn add_part(
        &mut self,
        kind: Kind,
        slug: &str,
        sourcefile: &Path,
        outputfile: String,
        parent: ElementId,
        configured_title: Option<String>,
        configured_stage: Option<String>,
    ) -> Option<ElementId> {
        if !self.claim_name(slug, sourcefile) {
            return None;
        }
        let mut info = PartInfo::new(slug, sourcefile, outputfile);
        info.configured_title = configured_title;
        info.configured_stage = configured_stage;
        info.parent = Some(parent);
        let part = self.directory.make(kind, slug, Detail::Part(Box::new(info)));
        if let Some(parent_info) = self.directory.element_mut(parent).part_info_mut() {
            parent_info.children.push(part);
        }
        self.add_pieces(part, sourcefile, false);
        Some(part)
    }

    fn claim_name(&mut self, name: &str, sourcefile: &Path) -> bool {
        let Some(existing) = self.directory.part_named(name) else {
            return true;
        };
        let other = match &self.directory.element(existing).detail {
            Detail::Part(info) => info.sourcefile.clone(),
            Detail::Archive { zipdir } => zipdir.clone(),
            _ => PathBuf::new(),
        };
        self.directory.report(
            Diagnostic::error(DiagnosticCode::DUPLICATE_PART, format!("duplicate part name '{name}'"))
                .in_file(sourcefile)
                .also_in(other),
        );
        false
    }

    /// Source file, topmatter, metadata derivation and the common pieces.
    fn add_common(&mut self, part: ElementId, sourcefile: &Path) -> (ElementId, ElementId) {
        let name = self.directory.element(part).name.clone();
        let src = self.directory.make_or_get(
            Kind::Sourcefile,
            &sourcefile.to_string_lossy(),
            Detail::File {
                path: sourcefile.to_path_buf(),
                posthoc: false,
            },
        );
        let of_part = Detail::OfPart { part };
        let topmatter = self.directory.make(Kind::Topmatter, &name, of_part.clone());
        self.directory.add_dependency(topmatter, src);
        let content = self.directory.make(Kind::Content, &name, of_part.clone());
        self.directory.make(Kind::MetadataDerivation, &name, of_part);
        self.directory.add_dependency(part, topmatter);
        if let Some(config_source) = self.config_source {
            self.directory.add_dependency(part, config_source);
        }
        (topmatter, content)
    }

    /// A body depends on the content, its include list and every file the
    /// previous run saw it include.
    fn add_body(&mut self, part: ElementId, body_kind: Kind, list_kind: Kind, content: ElementId) -> ElementId {
        let name = self.directory.element(part).name.clone();
        let list = self.directory.make(list_kind, &name, Detail::OfPart { part });
        let body = self.directory.make(body_kind, &name, Detail::OfPart { part });
        self.directory.add_dependency(body, content);
        self.directory.add_dependency(body, list);
        let includes = self
            .directory
            .cache()
            .read_set(&list_kind.cache_key(&name))
            .unwrap_or_default();
        for include in includes {
            let file = self.directory.make_or_get(
                Kind::Sourcefile,
                &include,
                Detail::File {
                    path: PathBuf::from(&include),
                    posthoc: true,
                },
            );
            self.directory.add_dependency(body, file);
        }
        self.directory.add_dependency(part, body);
        body
    }

    fn add_pieces(&mut self, part: ElementId, sourcefile: &Path, is_course: bool) {
        let name = self.directory.element(part).name.clone();
        let (_, content) = self.add_common(part, sourcefile);
        self.add_body(part, Kind::BodyS, Kind::IncludeListS, content);
        self.add_body(part, Kind::BodyI, Kind::IncludeListI, content);
        self.directory.make(Kind::TermrefList, &name, Detail::OfPart { part });
        if !is_course {
            self.directory.make(Kind::Tocline, &name, Detail::OfPart { part });
        }
        let toc = self.directory.make(Kind::Toc, &name, Detail::OfPart { part });
        self.directory.add_dependency(part, toc);
    }

    fn add_glossary(&mut self, course: ElementId, sourcefile: &Path) {
        let name = "glossary";
        if !self.claim_name(name, sourcefile) {
            return;
        }
        let mut info = PartInfo::new(name, sourcefile, "glossary.html");
        info.configured_title = Some("Glossary".to_string());
        info.parent = Some(course);
        let part = self.directory.make(Kind::Glossary, name, Detail::Part(Box::new(info)));
        let (_, content) = self.add_common(part, sourcefile);
        self.add_body(part, Kind::Glossarybody, Kind::IncludeListS, content);
        self.directory.make(Kind::Tocline, name, Detail::OfPart { part });
        let toc = self.directory.make(Kind::Toc, name, Detail::OfPart { part });
        self.directory.add_dependency(part, toc);
    }

    /// Registers the `*.zip` entries in the directory of `index_file`.
    fn add_zipdirs(&mut self, part: ElementId, index_file: &Path) -> SedrilaResult<()> {
        let Some(dir) = index_file.parent() else {
            return Ok(());
        };
        if !dir.is_dir() {
            return Ok(());
        }
        let entries = WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name();
        for entry in entries {
            let entry = entry.map_err(|e| InternalError::new(format!("cannot list {}: {e}", dir.display())))?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            if !filename.ends_with(".zip") {
                continue;
            }
            let path = entry.path().to_path_buf();
            if !entry.file_type().is_dir() {
                let sourcefile = self.directory.element(part).part_info().map(|p| p.sourcefile.clone());
                self.directory.report_warning(
                    DiagnosticCode::ZIP_NOT_A_DIR,
                    format!("'{}' must be a directory to be archived", path.display()),
                    &sourcefile.unwrap_or(path),
                );
                continue;
            }
            if !self.claim_name(&filename, &path) {
                continue;
            }
            let zipdir = self.directory.make(
                Kind::Zipdir,
                &path.to_string_lossy(),
                Detail::Tree { path: path.clone() },
            );
            let zipfile = self
                .directory
                .make(Kind::Zipfile, &filename, Detail::Archive { zipdir: path });
            self.directory.add_dependency(zipfile, zipdir);
        }
        Ok(())
    }

    /// Every file below the base resource directory is copied verbatim,
    /// keeping its relative path.
    fn add_base_resources(&mut self) -> SedrilaResult<()> {
        let Some(base) = &self.config.course.baseresourcedir else {
            return Ok(());
        };
        let base = self.directory.settings().course_dir.join(base);
        if !base.is_dir() {
            tracing::warn!(target: "sedrila.build", dir = %base.display(), "base resource directory not found");
            return Ok(());
        }
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.map_err(|e| InternalError::new(format!("cannot walk {}: {e}", base.display())))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let source = entry.path().to_path_buf();
            let relative = source.strip_prefix(&base).unwrap_or(&source).to_path_buf();
            let src = self.directory.make_or_get(
                Kind::Sourcefile,
                &source.to_string_lossy(),
                Detail::File {
                    path: source.clone(),
                    posthoc: false,
                },
            );
            let name = relative.to_string_lossy().replace('\\', "/");
            let copy = self.directory.make(
                Kind::CopiedFile,
                &name,
                Detail::Copy {
                    source,
                    target: relative,
                },
            );
            self.directory.add_dependency(copy, src);
        }
        Ok(())
    }
}

/// The task files of a taskgroup directory: `*.md` except `index.md`, by name.
fn task_files(dir: &Path) -> SedrilaResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| InternalError::new(format!("cannot list {}: {e}", dir.display())))?;
        let path = entry.path();
        let is_task = entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == "md")
            && entry.file_name() != "index.md";
        if is_task {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Settings;
    use sedrila_cache::CacheStore;

    const CONFIG: &str = r#"
[course]
title = "Course"
shorttitle = "C"
baseresourcedir = "base"

[[chapters]]
slug = "ch1"
title = "Chapter One"

[[chapters.taskgroups]]
slug = "tg1"
"#;

    fn course_tree(root: &Path) {
        let tg = root.join("ch/ch1/tg1");
        std::fs::create_dir_all(&tg).unwrap();
        std::fs::write(root.join("ch/index.md"), "---\nWelcome\n").unwrap();
        std::fs::write(root.join("ch/glossary.md"), "---\nTerms\n").unwrap();
        std::fs::write(root.join("ch/ch1/index.md"), "---\nChapter\n").unwrap();
        std::fs::write(tg.join("index.md"), "---\nGroup\n").unwrap();
        std::fs::write(tg.join("b-task.md"), "---\nB\n").unwrap();
        std::fs::write(tg.join("a-task.md"), "---\nA\n").unwrap();
        std::fs::write(tg.join("notes.txt"), "not a task").unwrap();
        std::fs::create_dir_all(root.join("ch/ch1/data.zip")).unwrap();
        std::fs::write(root.join("ch/ch1/data.zip/x.txt"), "x").unwrap();
        std::fs::write(root.join("ch/ch1/tg1-broken.zip"), "").unwrap();
        std::fs::create_dir_all(root.join("base/css")).unwrap();
        std::fs::write(root.join("base/css/site.css"), "").unwrap();
    }

    fn directory(root: &Path) -> Directory {
        let config = sedrila_config::load_config_from_str(CONFIG).unwrap();
        Directory::new(CacheStore::in_memory(), Settings::new(config, root, root.join("out")))
    }

    #[test]
    fn registers_all_parts() {
        let tmp = tempfile::tempdir().unwrap();
        course_tree(tmp.path());
        let mut dir = directory(tmp.path());
        let course = CourseBuilder::new(&mut dir).register().unwrap();

        assert_eq!(dir[course].name, "C");
        let tasks: Vec<_> = dir.all_of(Kind::Task).map(|id| dir[id].name.clone()).collect();
        assert_eq!(tasks, vec!["a-task", "b-task"]);
        assert!(dir.get(Kind::Chapter, "ch1").is_some());
        assert!(dir.get(Kind::Taskgroup, "tg1").is_some());
        assert!(dir.get(Kind::Glossary, "glossary").is_some());
        assert!(dir.get(Kind::Glossarybody, "glossary").is_some());
        assert!(dir.get(Kind::BodyS, "glossary").is_none());
        assert!(dir.get(Kind::Zipfile, "data.zip").is_some());
        assert!(dir.get(Kind::CopiedFile, "css/site.css").is_some());
        assert!(dir.get(Kind::Tocline, "C").is_none());
        assert_eq!(dir.sink().warning_count(), 1);

        let chapter = dir.get(Kind::Chapter, "ch1").unwrap();
        let info = dir[chapter].part_info().unwrap();
        assert_eq!(info.outputfile, "chapter-ch1.html");
        assert_eq!(info.configured_title.as_deref(), Some("Chapter One"));
        assert_eq!(info.parent, Some(course));
        assert_eq!(dir[course].part_info().unwrap().children, vec![chapter]);
    }

    #[test]
    fn page_dependencies() {
        let tmp = tempfile::tempdir().unwrap();
        course_tree(tmp.path());
        let mut dir = directory(tmp.path());
        CourseBuilder::new(&mut dir).register().unwrap();
        let task = dir.get(Kind::Task, "a-task").unwrap();
        let kinds: Vec<Kind> = dir[task].dependencies().iter().map(|d| dir[*d].kind).collect();
        assert_eq!(kinds, vec![Kind::Topmatter, Kind::BodyS, Kind::BodyI, Kind::Toc]);
        let glossary = dir.get(Kind::Glossary, "glossary").unwrap();
        let kinds: Vec<Kind> = dir[glossary].dependencies().iter().map(|d| dir[*d].kind).collect();
        assert_eq!(kinds, vec![Kind::Topmatter, Kind::Glossarybody, Kind::Toc]);
    }

    #[test]
    fn config_file_is_a_page_dependency() {
        let tmp = tempfile::tempdir().unwrap();
        course_tree(tmp.path());
        std::fs::write(tmp.path().join("sedrila.toml"), CONFIG).unwrap();
        let mut dir = directory(tmp.path());
        CourseBuilder::new(&mut dir).register().unwrap();
        let config_src = dir
            .get(Kind::Sourcefile, &tmp.path().join("sedrila.toml").to_string_lossy())
            .unwrap();
        for kind in Kind::PAGES {
            for page in dir.all_of(kind) {
                assert!(dir[page].dependencies().contains(&config_src), "{}", dir[page]);
            }
        }
        let task = dir.get(Kind::Task, "a-task").unwrap();
        let kinds: Vec<Kind> = dir[task].dependencies().iter().map(|d| dir[*d].kind).collect();
        assert_eq!(kinds, vec![Kind::Topmatter, Kind::Sourcefile, Kind::BodyS, Kind::BodyI, Kind::Toc]);
    }

    #[test]
    fn cached_includes_become_posthoc_sources() {
        let tmp = tempfile::tempdir().unwrap();
        course_tree(tmp.path());
        let mut cache = CacheStore::in_memory();
        let include = tmp.path().join("ch/ch1/tg1/snippet.md").to_string_lossy().into_owned();
        cache.write_set("a-task__includelist_s__", [include.clone()].into_iter().collect());
        let config = sedrila_config::load_config_from_str(CONFIG).unwrap();
        let mut dir = Directory::new(cache, Settings::new(config, tmp.path(), tmp.path().join("out")));
        CourseBuilder::new(&mut dir).register().unwrap();

        let source = dir.get(Kind::Sourcefile, &include).unwrap();
        let body = dir.get(Kind::BodyS, "a-task").unwrap();
        assert!(dir[body].dependencies().contains(&source));
        assert!(dir.cache().contains(&Kind::Sourcefile.cache_key(&include)));
    }

    #[test]
    fn duplicate_part_names_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        course_tree(tmp.path());
        std::fs::write(tmp.path().join("ch/ch1/tg1/tg1.md"), "---\n").unwrap();
        let mut dir = directory(tmp.path());
        CourseBuilder::new(&mut dir).register().unwrap();
        assert_eq!(dir.sink().error_count(), 1);
        assert!(dir.get(Kind::Task, "tg1").is_none());
        let diag = &dir.sink().diagnostics()[0];
        assert_eq!(diag.code, DiagnosticCode::DUPLICATE_PART);
        assert!(diag.file2.is_some());
    }
}
