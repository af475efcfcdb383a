//! Build elements: the nodes of the build graph.

use std::fmt;
use std::path::PathBuf;

use sedrila_cache::{State, Value};

use crate::kind::Kind;
use crate::tasks::TaskInfo;

/// Opaque, copyable index of an element in its [`Directory`](crate::Directory).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ElementId(u32);

impl ElementId {
    /// Creates an ID from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind-specific construction data of an element.
#[derive(Debug, Clone)]
pub enum Detail {
    /// A [`Kind::Sourcefile`]. `posthoc` files were discovered as includes
    /// and are recorded in the cache when registered.
    File {
        /// The file.
        path: PathBuf,
        /// Whether the file was discovered by a previous render.
        posthoc: bool,
    },
    /// A [`Kind::Zipdir`].
    Tree {
        /// The `*.zip` directory.
        path: PathBuf,
    },
    /// A [`Kind::CopiedFile`].
    Copy {
        /// The file to copy.
        source: PathBuf,
        /// Destination relative to each target directory.
        target: PathBuf,
    },
    /// A [`Kind::Zipfile`].
    Archive {
        /// The directory to archive.
        zipdir: PathBuf,
    },
    /// Pieces and steps that belong to a part.
    OfPart {
        /// The owning part.
        part: ElementId,
    },
    /// A course structure part.
    Part(Box<PartInfo>),
}

/// Course structure data of a part page.
#[derive(Debug, Clone)]
pub struct PartInfo {
    /// File and directory basename identifying the part.
    pub slug: String,
    /// The Markdown file the part is read from.
    pub sourcefile: PathBuf,
    /// Output file name, relative to the target directories.
    pub outputfile: String,
    /// Title from the configuration, used when the topmatter has none.
    pub configured_title: Option<String>,
    /// Stage from the configuration, used when the topmatter has none.
    pub configured_stage: Option<String>,
    /// Effective title, set by metadata derivation.
    pub title: String,
    /// Effective stage word, set by metadata derivation.
    pub stage: Option<String>,
    /// Whether the stage filter excludes this part itself.
    pub skip: bool,
    /// The enclosing part; `None` for the course.
    pub parent: Option<ElementId>,
    /// Enclosed parts in registration order.
    pub children: Vec<ElementId>,
    /// Task attributes, set by metadata derivation of tasks.
    pub task: Option<TaskInfo>,
}

impl PartInfo {
    /// Creates part data with the title defaulting to the slug.
    pub fn new(slug: impl Into<String>, sourcefile: impl Into<PathBuf>, outputfile: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            title: slug.clone(),
            slug,
            sourcefile: sourcefile.into(),
            outputfile: outputfile.into(),
            configured_title: None,
            configured_stage: None,
            stage: None,
            skip: false,
            parent: None,
            children: Vec::new(),
            task: None,
        }
    }
}

/// A node in the build graph.
#[derive(Debug, Clone)]
pub struct Element {
    /// The element's kind.
    pub kind: Kind,
    /// Path, file name or part name; unique within the kind.
    pub name: String,
    /// Freshness before the build, outcome after it.
    pub state: State,
    /// Kind-specific data.
    pub detail: Detail,
    pub(crate) dependencies: Vec<ElementId>,
    pub(crate) value: Option<Value>,
}

impl Element {
    /// Creates an element that has not been checked yet.
    pub fn new(kind: Kind, name: impl Into<String>, detail: Detail) -> Self {
        Self {
            kind,
            name: name.into(),
            state: State::Missing,
            detail,
            dependencies: Vec::new(),
            value: None,
        }
    }

    /// The element's cache key.
    pub fn cache_key(&self) -> String {
        self.kind.cache_key(&self.name)
    }

    /// The declared dependencies.
    pub fn dependencies(&self) -> &[ElementId] {
        &self.dependencies
    }

    /// The current value of a piece, if known.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The value as a string; empty if absent or not a scalar.
    pub fn scalar(&self) -> &str {
        self.value.as_ref().and_then(Value::as_scalar).unwrap_or("")
    }

    /// The part data, for part pages.
    pub fn part_info(&self) -> Option<&PartInfo> {
        match &self.detail {
            Detail::Part(info) => Some(info),
            _ => None,
        }
    }

    pub(crate) fn part_info_mut(&mut self) -> Option<&mut PartInfo> {
        match &mut self.detail {
            Detail::Part(info) => Some(info),
            _ => None,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.name)
    }
}
