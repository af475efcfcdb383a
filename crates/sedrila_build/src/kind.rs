//! The closed set of element kinds and their global build order.
//!
//! Dependencies only ever point from a later kind to an earlier one, so
//! building every element of each kind in [`Kind::ALL`] order guarantees
//! that all dependencies of an element are settled before it is asked to
//! build. This replaces a general topological sort.

use serde::Serialize;
use std::fmt;

use sedrila_cache::cache_key;

/// The category of an element; also the cache key namespace.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// A single input file.
    Sourcefile,
    /// A base resource copied verbatim into both target directories.
    CopiedFile,
    /// A `*.zip` directory tree slated for archiving.
    Zipdir,
    /// The archive built from a [`Kind::Zipdir`].
    Zipfile,
    /// The YAML front matter of a part file.
    Topmatter,
    /// The Markdown after the front matter; byproduct of [`Kind::Topmatter`].
    Content,
    /// Derives title, stage and skip flag of a part from its topmatter.
    MetadataDerivation,
    /// Checks and inverts task links and orders the tasks; one per course.
    TaskLinks,
    /// Files included by the student body.
    IncludeListS,
    /// Files included by the instructor body.
    IncludeListI,
    /// Terms referenced by the student body.
    TermrefList,
    /// Rendered student HTML of a part.
    BodyS,
    /// Rendered instructor HTML of a part.
    BodyI,
    /// Table-of-contents entry of a part.
    Tocline,
    /// Rendered glossary with its term index.
    Glossarybody,
    /// Table of contents shown on a part's page.
    Toc,
    /// The course home page.
    Course,
    /// A chapter page.
    Chapter,
    /// A taskgroup page.
    Taskgroup,
    /// A task page.
    Task,
    /// The glossary page.
    Glossary,
}

/// How an element of a kind behaves during a build.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    /// Externally supplied input; checking is its whole contract.
    Source,
    /// A cached value computed by the element's own build.
    Piece,
    /// A piece recomputed during every check and compared to the cache.
    FreshPiece,
    /// A piece whose value is set by another element's build.
    Byproduct,
    /// One file per target directory.
    Outputfile,
    /// A computation without cached state that runs every time.
    Step,
}

impl Kind {
    /// All kinds in build order.
    pub const ALL: [Kind; 21] = [
        Kind::Sourcefile,
        Kind::CopiedFile,
        Kind::Zipdir,
        Kind::Zipfile,
        Kind::Topmatter,
        Kind::Content,
        Kind::MetadataDerivation,
        Kind::TaskLinks,
        Kind::IncludeListS,
        Kind::IncludeListI,
        Kind::TermrefList,
        Kind::BodyS,
        Kind::BodyI,
        Kind::Tocline,
        Kind::Glossarybody,
        Kind::Toc,
        Kind::Course,
        Kind::Chapter,
        Kind::Taskgroup,
        Kind::Task,
        Kind::Glossary,
    ];

    /// The kinds that are course structure parts with an HTML page.
    pub const PAGES: [Kind; 5] = [
        Kind::Course,
        Kind::Chapter,
        Kind::Taskgroup,
        Kind::Task,
        Kind::Glossary,
    ];

    /// Position in the build order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase name used as cache key namespace.
    pub fn tag(self) -> &'static str {
        match self {
            Kind::Sourcefile => "sourcefile",
            Kind::CopiedFile => "copiedfile",
            Kind::Zipdir => "zipdir",
            Kind::Zipfile => "zipfile",
            Kind::Topmatter => "topmatter",
            Kind::Content => "content",
            Kind::MetadataDerivation => "metadataderivation",
            Kind::TaskLinks => "tasklinks",
            Kind::IncludeListS => "includelist_s",
            Kind::IncludeListI => "includelist_i",
            Kind::TermrefList => "termreflist",
            Kind::BodyS => "body_s",
            Kind::BodyI => "body_i",
            Kind::Glossarybody => "glossarybody",
            Kind::Tocline => "tocline",
            Kind::Toc => "toc",
            Kind::Course => "course",
            Kind::Chapter => "chapter",
            Kind::Taskgroup => "taskgroup",
            Kind::Task => "task",
            Kind::Glossary => "glossary",
        }
    }

    /// The build behavior of this kind.
    pub fn role(self) -> Role {
        match self {
            Kind::Sourcefile | Kind::Zipdir => Role::Source,
            Kind::Topmatter | Kind::BodyS | Kind::BodyI | Kind::Glossarybody | Kind::Toc => {
                Role::Piece
            }
            Kind::Tocline => Role::FreshPiece,
            Kind::Content | Kind::IncludeListS | Kind::IncludeListI | Kind::TermrefList => {
                Role::Byproduct
            }
            Kind::CopiedFile
            | Kind::Zipfile
            | Kind::Course
            | Kind::Chapter
            | Kind::Taskgroup
            | Kind::Task
            | Kind::Glossary => Role::Outputfile,
            Kind::MetadataDerivation | Kind::TaskLinks => Role::Step,
        }
    }

    /// Whether elements of this kind carry a cached value.
    pub fn is_piece(self) -> bool {
        matches!(self.role(), Role::Piece | Role::FreshPiece | Role::Byproduct)
    }

    /// Whether this kind is a course structure part with its own page.
    pub fn is_page(self) -> bool {
        Kind::PAGES.contains(&self)
    }

    /// Whether elements of this kind are named parts (possible link targets).
    pub fn is_part(self) -> bool {
        self.is_page() || self == Kind::Zipfile
    }

    /// Indentation level of this kind's table-of-contents entries.
    pub fn toc_level(self) -> usize {
        match self {
            Kind::Taskgroup => 1,
            Kind::Task => 2,
            _ => 0,
        }
    }

    /// The cache key of the element of this kind called `name`.
    pub fn cache_key(self, name: &str) -> String {
        cache_key(name, self.tag())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
