//! Multi-run tests of the incremental build on an on-disk course.
//!
//! Run start times are fixed explicitly and file modification times are
//! placed relative to them, so that "modified since the previous run" never
//! depends on the clock.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use sedrila_build::{run_author, AuthorOptions, BuildReport, Kind};
use sedrila_cache::State;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helper: a small course and a run counter
// ---------------------------------------------------------------------------

const RUN_INTERVAL: Duration = Duration::from_secs(600);

const CONFIG: &str = r#"
[course]
title = "Shell Course"
shorttitle = "shell-course"
stages = ["draft"]
baseresourcedir = "base"

[[chapters]]
slug = "basics"
title = "Basics"

[[chapters.taskgroups]]
slug = "shell"
title = "The Shell"
"#;

const LS: &str = "title: Listing\ndifficulty: 2\ntimevalue: 1\n---\nUse `ls`.\n\n[INCLUDE::includes/snippet.md]\n\n\
                  [INSTRUCTOR::Solution]\nls -l\n[ENDINSTRUCTOR]\n";

struct Course {
    dir: TempDir,
    base: SystemTime,
    runs: u32,
}

impl Course {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let course = Self {
            dir,
            base: SystemTime::now() - Duration::from_secs(24 * 3600),
            runs: 0,
        };
        let files = [
            ("sedrila.toml", CONFIG),
            ("ch/index.md", "---\nWelcome.\n"),
            ("ch/glossary.md", "---\n**cd**: change directory.\n"),
            ("ch/basics/index.md", "---\nFirst steps.\n"),
            ("ch/basics/data.zip/readme.txt", "exercise data\n"),
            ("ch/basics/shell/index.md", "---\nShell tasks.\n"),
            ("ch/basics/shell/ls.md", LS),
            ("ch/basics/shell/includes/snippet.md", "Snippet text.\n"),
            ("ch/basics/shell/cd.md", "title: Changing directories\ndifficulty: 1\ntimevalue: 0.5\n---\nUse [TERMREF::cd].\n"),
            ("base/sedrila.css", "body { margin: 0 }\n"),
        ];
        for (rel, text) in files {
            let path = course.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, text).unwrap();
            course.set_mtime(rel, course.base - Duration::from_secs(3600));
        }
        course
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn out(&self, rel: &str) -> PathBuf {
        self.dir.path().join("out").join(rel)
    }

    fn name(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().into_owned()
    }

    fn set_mtime(&self, rel: &str, when: SystemTime) {
        filetime::set_file_mtime(self.path(rel), FileTime::from_system_time(when)).unwrap();
    }

    /// Marks `rel` as modified after the start of the most recent run.
    fn touch(&self, rel: &str) {
        let last_start = self.base + RUN_INTERVAL * self.runs.saturating_sub(1);
        self.set_mtime(rel, last_start + RUN_INTERVAL / 2);
    }

    fn write(&self, rel: &str, text: &str) {
        fs::write(self.path(rel), text).unwrap();
        self.touch(rel);
    }

    fn author(&mut self) -> BuildReport {
        self.author_with(|_| {})
    }

    fn author_with(&mut self, adjust: impl FnOnce(&mut AuthorOptions)) -> BuildReport {
        let mut options = AuthorOptions::new(self.dir.path(), self.dir.path().join("out"));
        options.start_time = Some(self.base + RUN_INTERVAL * self.runs);
        adjust(&mut options);
        self.runs += 1;
        run_author(&options).unwrap()
    }
}

fn assert_state(report: &BuildReport, kind: Kind, name: &str, expected: State) {
    assert_eq!(
        report.state_of(kind, name),
        Some(expected),
        "{kind}({name})"
    );
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ---------------------------------------------------------------------------
// Full and no-op runs
// ---------------------------------------------------------------------------

#[test]
fn first_run_builds_everything() {
    let mut course = Course::new();
    let report = course.author();
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    for page in ["index.html", "chapter-basics.html", "shell.html", "ls.html", "cd.html", "glossary.html"] {
        assert!(course.out(page).exists(), "{page}");
        assert!(course.out("instructor").join(page).exists(), "{page}");
    }
    assert!(course.out("data.zip").exists());
    assert!(course.out("instructor/data.zip").exists());
    assert_eq!(read(&course.out("sedrila.css")), "body { margin: 0 }\n");

    let student = read(&course.out("ls.html"));
    let instructor = read(&course.out("instructor/ls.html"));
    assert!(student.contains("Snippet text."));
    assert!(!student.contains("ls -l"));
    assert!(instructor.contains("ls -l"));

    let glossary = read(&course.out("glossary.html"));
    assert!(glossary.contains("<dt id='term-cd'>cd</dt>"));
    assert!(glossary.contains("<a href='cd.html'>Changing directories</a>"));

    let toc_page = read(&course.out("index.html"));
    assert!(toc_page.contains("'ls.html'"));
    assert!(toc_page.contains("'glossary.html'"));
}

#[test]
fn second_run_without_changes_is_a_no_op() {
    let mut course = Course::new();
    course.author();
    let report = course.author();
    for element in &report.elements {
        if matches!(element.kind, Kind::MetadataDerivation | Kind::TaskLinks) {
            assert_eq!(element.state, State::Changed);
        } else {
            assert_eq!(element.state, State::Unchanged, "{}({})", element.kind, element.name);
        }
    }
    assert!(report.files_written.is_empty(), "{:?}", report.files_written);
    assert!(report.files_removed.is_empty());
}

// ---------------------------------------------------------------------------
// Change propagation
// ---------------------------------------------------------------------------

#[test]
fn content_change_rebuilds_only_its_part() {
    let mut course = Course::new();
    course.author();
    course.write("ch/basics/shell/cd.md", "title: Changing directories\ndifficulty: 1\ntimevalue: 0.5\n---\nUse [TERMREF::cd] often.\n");
    let report = course.author();

    assert_state(&report, Kind::Sourcefile, &course.name("ch/basics/shell/cd.md"), State::Changed);
    assert_state(&report, Kind::Topmatter, "cd", State::Unchanged);
    assert_state(&report, Kind::Content, "cd", State::Changed);
    assert_state(&report, Kind::BodyS, "cd", State::Changed);
    assert_state(&report, Kind::TermrefList, "cd", State::Unchanged);
    assert_state(&report, Kind::Glossarybody, "glossary", State::Unchanged);
    assert_state(&report, Kind::Task, "cd", State::Changed);
    assert_state(&report, Kind::Task, "ls", State::Unchanged);
    assert_state(&report, Kind::Toc, "shell-course", State::Unchanged);
    assert_eq!(report.files_written, vec![course.out("cd.html"), course.out("instructor/cd.html")]);
    assert!(read(&course.out("cd.html")).contains("often"));
}

#[test]
fn touched_file_with_same_content_rewrites_nothing() {
    let mut course = Course::new();
    course.author();
    course.touch("ch/basics/shell/ls.md");
    let report = course.author();

    assert_state(&report, Kind::Sourcefile, &course.name("ch/basics/shell/ls.md"), State::Changed);
    assert_state(&report, Kind::Topmatter, "ls", State::Unchanged);
    assert_state(&report, Kind::Content, "ls", State::Unchanged);
    assert_state(&report, Kind::BodyS, "ls", State::Unchanged);
    assert_state(&report, Kind::Task, "ls", State::Unchanged);
    assert!(report.files_written.is_empty());
}

#[test]
fn title_change_updates_every_toc() {
    let mut course = Course::new();
    course.author();
    course.write("ch/basics/shell/ls.md", &LS.replace("Listing", "Listing files"));
    let report = course.author();

    assert_state(&report, Kind::Topmatter, "ls", State::Changed);
    assert_state(&report, Kind::Tocline, "ls", State::Changed);
    assert_state(&report, Kind::Tocline, "cd", State::Unchanged);
    assert_state(&report, Kind::Toc, "shell-course", State::Changed);
    assert_state(&report, Kind::Chapter, "basics", State::Changed);
    assert!(read(&course.out("chapter-basics.html")).contains("Listing files"));
    let json = read(&course.out("course.json"));
    assert!(json.contains("Listing files"));
}

#[test]
fn config_title_change_rewrites_every_page() {
    let mut course = Course::new();
    course.author();
    course.write("sedrila.toml", &CONFIG.replace("title = \"Shell Course\"", "title = \"Shell Basics\""));
    let report = course.author();

    assert_state(&report, Kind::Sourcefile, &course.name("sedrila.toml"), State::Changed);
    assert_state(&report, Kind::BodyS, "ls", State::Unchanged);
    for (kind, name, page) in [
        (Kind::Course, "shell-course", "index.html"),
        (Kind::Chapter, "basics", "chapter-basics.html"),
        (Kind::Task, "ls", "ls.html"),
        (Kind::Glossary, "glossary", "glossary.html"),
    ] {
        assert_state(&report, kind, name, State::Changed);
        assert!(read(&course.out(page)).contains("Shell Basics"), "{page}");
        assert!(read(&course.out("instructor").join(page)).contains("Shell Basics"), "{page}");
    }
}

#[test]
fn retitled_part_updates_glossary_term_index() {
    let mut course = Course::new();
    course.author();
    course.write("ch/basics/shell/cd.md", "title: Moving around\ndifficulty: 1\ntimevalue: 0.5\n---\nUse [TERMREF::cd].\n");
    let report = course.author();

    assert_state(&report, Kind::TermrefList, "cd", State::Unchanged);
    assert_state(&report, Kind::Tocline, "cd", State::Changed);
    assert_state(&report, Kind::Glossarybody, "glossary", State::Changed);
    let glossary = read(&course.out("glossary.html"));
    assert!(glossary.contains("<a href='cd.html'>Moving around</a>"));
    assert!(!glossary.contains("Changing directories"));
}

#[test]
fn new_task_link_reorders_and_decorates_toc() {
    let mut course = Course::new();
    course.author();
    let before = read(&course.out("shell.html"));
    assert!(before.find("'cd.html'").unwrap() < before.find("'ls.html'").unwrap());

    course.write(
        "ch/basics/shell/cd.md",
        "title: Changing directories\ndifficulty: 1\ntimevalue: 0.5\nassumes: ls\n---\nUse [TERMREF::cd].\n",
    );
    let report = course.author();
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_state(&report, Kind::Tocline, "ls", State::Changed);
    assert_state(&report, Kind::Toc, "shell", State::Changed);
    assert_state(&report, Kind::Task, "ls", State::Changed);

    let after = read(&course.out("shell.html"));
    assert!(after.find("'ls.html'").unwrap() < after.find("'cd.html'").unwrap());
    assert!(after.contains("<span class='assumed-by-decoration' title='assumed by: cd'></span>"));
    assert!(after.contains("<span class='assumes-decoration' title='assumes: ls'></span>"));
}

#[test]
fn unknown_task_link_is_reported() {
    let mut course = Course::new();
    course.author();
    course.write(
        "ch/basics/shell/cd.md",
        "title: Changing directories\ndifficulty: 1\ntimevalue: 0.5\nrequires: nowhere\n---\nUse [TERMREF::cd].\n",
    );
    let report = course.author();
    assert_eq!(report.error_count(), 1);
    assert!(report.diagnostics[0].message.contains("'nowhere'"));
    assert_eq!(report.diagnostics[0].file, Some(course.path("ch/basics/shell/cd.md")));
}

#[test]
fn instructor_only_change_keeps_student_page() {
    let mut course = Course::new();
    course.author();
    course.write("ch/basics/shell/ls.md", &LS.replace("ls -l", "ls -la"));
    let report = course.author();

    assert_state(&report, Kind::BodyS, "ls", State::Unchanged);
    assert_state(&report, Kind::BodyI, "ls", State::Changed);
    assert_eq!(report.files_written, vec![course.out("instructor/ls.html")]);
    assert!(read(&course.out("instructor/ls.html")).contains("ls -la"));
}

#[test]
fn zip_directory_change_rebuilds_archive() {
    let mut course = Course::new();
    course.author();
    fs::write(course.path("ch/basics/data.zip/more.txt"), "more").unwrap();
    course.touch("ch/basics/data.zip/more.txt");
    let report = course.author();
    assert_state(&report, Kind::Zipdir, &course.name("ch/basics/data.zip"), State::Changed);
    assert_state(&report, Kind::Zipfile, "data.zip", State::Changed);
    assert!(report.files_written.contains(&course.out("data.zip")));
}

// ---------------------------------------------------------------------------
// Includes and diagnostics across runs
// ---------------------------------------------------------------------------

#[test]
fn include_becomes_dependency_one_run_later() {
    let mut course = Course::new();
    let snippet = course.name("ch/basics/shell/includes/snippet.md");

    let first = course.author();
    assert_eq!(first.state_of(Kind::Sourcefile, &snippet), None);

    let second = course.author();
    assert_state(&second, Kind::Sourcefile, &snippet, State::Unchanged);

    course.write("ch/basics/shell/includes/snippet.md", "Updated snippet.\n");
    let third = course.author();
    assert_state(&third, Kind::Sourcefile, &snippet, State::Changed);
    assert_state(&third, Kind::BodyS, "ls", State::Changed);
    assert!(read(&course.out("ls.html")).contains("Updated snippet."));
}

#[test]
fn diagnostics_are_repeated_until_fixed() {
    let mut course = Course::new();
    course.author();
    let cd = "ch/basics/shell/cd.md";
    course.write(cd, "title: Changing directories\ndifficulty: 1\ntimevalue: 0.5\n---\nUse [TERMREF::cd]. [BOGUS]\n");
    let flagged = course.author();
    assert_eq!(flagged.warning_count(), 1);

    let replayed = course.author();
    assert_eq!(replayed.warning_count(), 1);
    assert_state(&replayed, Kind::Sourcefile, &course.name(cd), State::Changed);
    assert_state(&replayed, Kind::BodyS, "cd", State::Unchanged);
    assert!(replayed.files_written.is_empty());

    course.write(cd, "title: Changing directories\ndifficulty: 1\ntimevalue: 0.5\n---\nUse [TERMREF::cd].\n");
    let fixed = course.author();
    assert!(fixed.diagnostics.is_empty());
    let quiet = course.author();
    assert!(quiet.diagnostics.is_empty());
    assert_state(&quiet, Kind::Sourcefile, &course.name(cd), State::Unchanged);
}

// ---------------------------------------------------------------------------
// Cache handling and stage filtering
// ---------------------------------------------------------------------------

#[test]
fn corrupt_cache_rebuilds_from_scratch() {
    let mut course = Course::new();
    course.author();
    fs::write(course.out("instructor/.sedrila_cache"), b"garbage").unwrap();
    let report = course.author();
    assert!(report.diagnostics.is_empty());
    assert_state(&report, Kind::Sourcefile, &course.name("ch/basics/shell/ls.md"), State::Changed);
    assert_state(&report, Kind::Task, "ls", State::Changed);
    assert!(report.files_written.contains(&course.out("ls.html")));

    let after = course.author();
    assert_state(&after, Kind::Task, "ls", State::Unchanged);
}

#[test]
fn clean_run_ignores_cache() {
    let mut course = Course::new();
    course.author();
    let report = course.author_with(|options| options.clean = true);
    assert_state(&report, Kind::BodyS, "ls", State::Changed);
    assert!(report.files_written.contains(&course.out("instructor/ls.html")));
}

#[test]
fn draft_task_follows_include_stage() {
    let mut course = Course::new();
    fs::write(course.path("ch/basics/shell/wip.md"), "stage: draft\ndifficulty: 3\ntimevalue: 2\n---\nNot ready.\n").unwrap();
    course.set_mtime("ch/basics/shell/wip.md", course.base - Duration::from_secs(3600));

    course.author();
    assert!(!course.out("wip.html").exists());
    assert!(!read(&course.out("shell.html")).contains("'wip.html'"));

    let report = course.author_with(|options| options.include_stage = Some("draft".into()));
    assert_state(&report, Kind::Task, "wip", State::Changed);
    assert!(course.out("wip.html").exists());
    assert!(read(&course.out("shell.html")).contains("'wip.html'"));

    let report = course.author();
    assert!(report.files_removed.contains(&course.out("wip.html")));
    assert!(!course.out("instructor/wip.html").exists());
}
