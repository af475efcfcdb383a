//! Output files: part pages, copied base resources and zip archives.
//!
//! Every output exists once per target directory. The instructor variant is
//! a superset of the student variant.

use std::fs::File;
use std::path::{Path, PathBuf};

use sedrila_cache::State;
use sedrila_common::{InternalError, Mode, SedrilaResult};
use walkdir::WalkDir;

use crate::directory::Directory;
use crate::element::{Detail, ElementId};
use crate::kind::Kind;
use crate::template::Page;

impl Directory {
    /// The files an output element produces: student variant first.
    pub fn output_files(&self, id: ElementId) -> Vec<PathBuf> {
        let element = self.element(id);
        let relative = match &element.detail {
            Detail::Part(info) => PathBuf::from(&info.outputfile),
            Detail::Copy { target, .. } => target.clone(),
            Detail::Archive { .. } => PathBuf::from(&element.name),
            _ => return Vec::new(),
        };
        let settings = self.settings();
        vec![settings.student_dir.join(&relative), settings.instructor_dir.join(&relative)]
    }

    /// An output is up to date when all its files exist. A skipped page has
    /// nothing to write and counts as up to date.
    pub(crate) fn check_outputfile(&mut self, id: ElementId) -> SedrilaResult<()> {
        let state = if self.element(id).kind.is_page() && self.to_be_skipped(id) {
            State::Unchanged
        } else if self.output_files(id).iter().all(|path| path.exists()) {
            State::Unchanged
        } else {
            State::Missing
        };
        self.element_mut(id).state = state;
        Ok(())
    }

    pub(crate) fn write_output(&mut self, path: &Path, contents: &[u8]) -> SedrilaResult<()> {
        create_parent(path)?;
        std::fs::write(path, contents).map_err(|e| InternalError::io(path, e))?;
        tracing::info!(target: "sedrila.build", file = %path.display(), "wrote");
        self.files_written.push(path.to_path_buf());
        Ok(())
    }

    pub(crate) fn copy_file(&mut self, id: ElementId) -> SedrilaResult<()> {
        let Detail::Copy { source, .. } = &self.element(id).detail else {
            return Err(InternalError::new(format!("{} has no copy source", self.element(id))));
        };
        let source = source.clone();
        for target in self.output_files(id) {
            create_parent(&target)?;
            std::fs::copy(&source, &target).map_err(|e| InternalError::io(&source, e))?;
            tracing::info!(target: "sedrila.build", file = %target.display(), "copied");
            self.files_written.push(target);
        }
        Ok(())
    }

    /// Archives the zip directory into the instructor target dir and copies
    /// the archive to the student target dir. Entry names start with the
    /// directory name minus its `.zip` suffix.
    pub(crate) fn write_zipfile(&mut self, id: ElementId) -> SedrilaResult<()> {
        let element = self.element(id);
        let Detail::Archive { zipdir } = &element.detail else {
            return Err(InternalError::new(format!("{element} has no zip directory")));
        };
        let zipdir = zipdir.clone();
        let prefix = element.name.strip_suffix(".zip").unwrap_or(&element.name).to_string();
        let [student, instructor] = <[PathBuf; 2]>::try_from(self.output_files(id))
            .map_err(|_| InternalError::new("zipfile needs two targets"))?;

        create_parent(&instructor)?;
        let file = File::create(&instructor).map_err(|e| InternalError::io(&instructor, e))?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let zip_error = |e: zip::result::ZipError| {
            InternalError::new(format!("cannot write {}: {e}", instructor.display()))
        };
        for entry in WalkDir::new(&zipdir).sort_by_file_name() {
            let entry = entry.map_err(|e| InternalError::new(format!("cannot walk {}: {e}", zipdir.display())))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&zipdir).unwrap_or(entry.path());
            let name = Path::new(&prefix).join(rel).to_string_lossy().replace('\\', "/");
            zip.start_file(name, options).map_err(zip_error)?;
            let mut input = File::open(entry.path()).map_err(|e| InternalError::io(entry.path(), e))?;
            std::io::copy(&mut input, &mut zip).map_err(|e| InternalError::io(entry.path(), e))?;
        }
        zip.finish().map_err(zip_error)?;
        tracing::info!(target: "sedrila.build", file = %instructor.display(), "wrote archive");
        self.files_written.push(instructor.clone());

        create_parent(&student)?;
        std::fs::copy(&instructor, &student).map_err(|e| InternalError::io(&student, e))?;
        self.files_written.push(student);
        Ok(())
    }

    /// Writes both variants of a part page.
    ///
    /// When the instructor body is the only thing that changed, the student
    /// page is left alone.
    pub(crate) fn write_part_page(&mut self, id: ElementId) -> SedrilaResult<()> {
        if self.to_be_skipped(id) {
            tracing::debug!(target: "sedrila.build", part = %self.element(id), "skipped by stage");
            return Ok(());
        }
        let element = self.element(id);
        let (body_s, body_i) = if element.kind == Kind::Glossary {
            let body = self.sibling(id, Kind::Glossarybody)?;
            (body, body)
        } else {
            (self.sibling(id, Kind::BodyS)?, self.sibling(id, Kind::BodyI)?)
        };
        let changed: Vec<ElementId> = element
            .dependencies()
            .iter()
            .copied()
            .filter(|dep| self.element(*dep).state.needs_build())
            .collect();
        let instructor_only =
            element.state != State::Missing && changed.len() == 1 && self.element(changed[0]).kind == Kind::BodyI;
        let [student_file, instructor_file] = <[PathBuf; 2]>::try_from(self.output_files(id))
            .map_err(|_| InternalError::new("a page needs two targets"))?;

        let mut variants = vec![(Mode::Instructor, body_i, instructor_file)];
        if !instructor_only {
            variants.insert(0, (Mode::Student, body_s, student_file));
        }
        for (mode, body, file) in variants {
            let html = self.render_page(id, body, mode)?;
            self.write_output(&file, html.as_bytes())?;
        }
        Ok(())
    }

    fn render_page(&self, part: ElementId, body: ElementId, mode: Mode) -> SedrilaResult<String> {
        let toc = self.sibling(part, Kind::Toc)?;
        let breadcrumb = self.breadcrumb(part);
        let page = Page {
            sitetitle: &self.settings().config.course.title,
            breadcrumb: &breadcrumb,
            title: &self.part_info(part)?.title,
            toc: self.element(toc).scalar(),
            body: self.element(body).scalar(),
            mode,
        };
        Ok(self.template.render_page(&page))
    }
}

fn create_parent(path: &Path) -> SedrilaResult<()> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent).map_err(|e| InternalError::io(parent, e)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Settings;
    use crate::element::PartInfo;
    use sedrila_cache::{CacheStore, Value};
    use std::io::Read;

    fn directory(target: &Path) -> Directory {
        let config = sedrila_config::load_config_from_str(
            "[course]\ntitle = \"My Course\"\nshorttitle = \"C\"\n",
        )
        .unwrap();
        Directory::new(CacheStore::in_memory(), Settings::new(config, ".", target))
    }

    fn page(dir: &mut Directory) -> ElementId {
        let part = dir.make(
            Kind::Task,
            "t",
            Detail::Part(Box::new(PartInfo::new("t", "t.md", "t.html"))),
        );
        for (kind, html) in [(Kind::BodyS, "<p>student</p>"), (Kind::BodyI, "<p>instructor</p>"), (Kind::Toc, "")] {
            let piece = dir.make(kind, "t", Detail::OfPart { part });
            dir.element_mut(piece).value = Some(Value::Scalar(html.into()));
            dir.element_mut(piece).state = State::Unchanged;
            dir.add_dependency(part, piece);
        }
        part
    }

    #[test]
    fn page_written_to_both_targets() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dir = directory(tmp.path());
        let part = page(&mut dir);
        dir.check_outputfile(part).unwrap();
        assert_eq!(dir[part].state, State::Missing);
        dir.write_part_page(part).unwrap();
        let student = std::fs::read_to_string(tmp.path().join("t.html")).unwrap();
        let instructor = std::fs::read_to_string(tmp.path().join("instructor/t.html")).unwrap();
        assert!(student.contains("<p>student</p>"));
        assert!(instructor.contains("<p>instructor</p>"));
        assert!(student.contains("My Course"));
        dir.check_outputfile(part).unwrap();
        assert_eq!(dir[part].state, State::Unchanged);
    }

    #[test]
    fn instructor_only_change_keeps_student_page() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dir = directory(tmp.path());
        let part = page(&mut dir);
        dir.write_part_page(part).unwrap();
        dir.files_written.clear();
        dir.element_mut(part).state = State::Unchanged;
        let body_i = dir.get(Kind::BodyI, "t").unwrap();
        dir.element_mut(body_i).state = State::Changed;
        dir.write_part_page(part).unwrap();
        assert_eq!(dir.files_written(), &[tmp.path().join("instructor/t.html")]);
    }

    #[test]
    fn skipped_page_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dir = directory(tmp.path());
        let part = page(&mut dir);
        dir.element_mut(part).part_info_mut().unwrap().skip = true;
        dir.check_outputfile(part).unwrap();
        assert_eq!(dir[part].state, State::Unchanged);
        dir.write_part_page(part).unwrap();
        assert!(dir.files_written().is_empty());
    }

    #[test]
    fn zipfile_contains_prefixed_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("src/data.zip");
        std::fs::create_dir_all(source.join("sub")).unwrap();
        std::fs::write(source.join("a.txt"), "alpha").unwrap();
        std::fs::write(source.join("sub/b.txt"), "beta").unwrap();
        let target = tmp.path().join("out");
        let mut dir = directory(&target);
        let id = dir.make(Kind::Zipfile, "data.zip", Detail::Archive { zipdir: source });
        dir.write_zipfile(id).unwrap();

        let archive = File::open(target.join("instructor/data.zip")).unwrap();
        let mut archive = zip::ZipArchive::new(archive).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["data/a.txt", "data/sub/b.txt"]);
        let mut text = String::new();
        archive.by_name("data/sub/b.txt").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "beta");
        assert!(target.join("data.zip").exists());
    }

    #[test]
    fn copied_file_lands_in_both_targets() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("style.css");
        std::fs::write(&source, "body {}").unwrap();
        let target = tmp.path().join("out");
        let mut dir = directory(&target);
        let id = dir.make(
            Kind::CopiedFile,
            "css/style.css",
            Detail::Copy { source, target: PathBuf::from("css/style.css") },
        );
        dir.copy_file(id).unwrap();
        assert_eq!(std::fs::read_to_string(target.join("css/style.css")).unwrap(), "body {}");
        assert!(target.join("instructor/css/style.css").exists());
        assert_eq!(dir.files_written().len(), 2);
    }
}
