//! The generic build contract shared by all element kinds.
//!
//! `build` checks the element's own resource first; a stale element is
//! rebuilt unconditionally. Otherwise the first stale dependency triggers the
//! rebuild. Dependencies are judged by their direct state only: the kind
//! order guarantees each of them was already built in this run.

use sedrila_cache::{State, Value};
use sedrila_common::{InternalError, SedrilaResult};

use crate::directory::Directory;
use crate::element::{Detail, ElementId};
use crate::kind::{Kind, Role};

impl Directory {
    pub(crate) fn build(&mut self, id: ElementId) -> SedrilaResult<()> {
        self.check_existing_resource(id)?;
        let state = self.element(id).state;
        if state.needs_build() {
            tracing::debug!(
                target: "sedrila.build",
                element = %self.element(id),
                %state,
                "rebuild: own state"
            );
            return self.rebuild(id);
        }
        for dependency in self.list_dependencies(id) {
            let dep = self.element(dependency);
            if dep.state.needs_build() {
                tracing::debug!(
                    target: "sedrila.build",
                    element = %self.element(id),
                    dependency = %dep,
                    state = %dep.state,
                    "rebuild: dependency"
                );
                return self.rebuild(id);
            }
        }
        Ok(())
    }

    fn rebuild(&mut self, id: ElementId) -> SedrilaResult<()> {
        self.do_build(id)?;
        let element = self.element_mut(id);
        if !element.kind.is_piece() || element.state == State::Missing {
            element.state = State::Changed;
        }
        tracing::debug!(target: "sedrila.build", element = %element, state = %element.state, "built");
        Ok(())
    }

    /// Sets the element's state from the filesystem or the cache.
    fn check_existing_resource(&mut self, id: ElementId) -> SedrilaResult<()> {
        let kind = self.element(id).kind;
        match kind.role() {
            Role::Source if kind == Kind::Zipdir => self.check_zipdir(id)?,
            Role::Source => self.check_sourcefile(id),
            Role::Piece => {
                self.check_piece(id);
                if matches!(kind, Kind::BodyS | Kind::BodyI | Kind::Glossarybody) {
                    self.check_body(id)?;
                }
            }
            Role::FreshPiece => self.check_tocline(id)?,
            Role::Byproduct => {
                if self.element(id).value.is_none() {
                    self.check_piece(id);
                }
            }
            Role::Outputfile => self.check_outputfile(id)?,
            Role::Step => self.element_mut(id).state = State::Changed,
        }
        Ok(())
    }

    /// Loads a piece's value and state from the cache. A cached value of the
    /// wrong shape counts as missing.
    fn check_piece(&mut self, id: ElementId) {
        let key = self.element(id).cache_key();
        let (value, state) = self.cache.read_with_state(&key);
        let expected = shape_of(self.element(id).kind);
        let element = self.element_mut(id);
        match value {
            Some(value) if value.shape_tag() == expected => {
                element.value = Some(value);
                element.state = state;
            }
            _ => element.state = State::Missing,
        }
    }

    /// The declared dependencies plus the implicit ones of aggregating kinds.
    fn list_dependencies(&self, id: ElementId) -> Vec<ElementId> {
        let element = self.element(id);
        let mut deps = element.dependencies.clone();
        match element.kind {
            Kind::Glossarybody => {
                // The term index shows the titles of referencing parts.
                for list in self.all_of(Kind::TermrefList) {
                    deps.push(list);
                    let list = self.element(list);
                    if !matches!(&list.value, Some(Value::Set(terms)) if !terms.is_empty()) {
                        continue;
                    }
                    let title_source = self
                        .get(Kind::Tocline, &list.name)
                        .or_else(|| self.get(Kind::Topmatter, &list.name));
                    deps.extend(title_source);
                }
            }
            Kind::Toc => deps.extend(self.all_of(Kind::Tocline)),
            _ => {}
        }
        deps
    }

    fn do_build(&mut self, id: ElementId) -> SedrilaResult<()> {
        match self.element(id).kind {
            Kind::Sourcefile | Kind::Zipdir => Ok(()),
            Kind::Content | Kind::IncludeListS | Kind::IncludeListI | Kind::TermrefList => Ok(()),
            Kind::CopiedFile => self.copy_file(id),
            Kind::Zipfile => self.write_zipfile(id),
            Kind::Topmatter => self.build_topmatter(id),
            Kind::MetadataDerivation => self.derive_metadata(id),
            Kind::TaskLinks => self.link_tasks(id),
            Kind::BodyS => self.build_body(id, sedrila_common::Mode::Student),
            Kind::BodyI => self.build_body(id, sedrila_common::Mode::Instructor),
            Kind::Glossarybody => self.build_glossarybody(id),
            Kind::Tocline => {
                let value = self.element(id).value.clone().unwrap_or(Value::Scalar(String::new()));
                self.commit_built_value(id, value);
                Ok(())
            }
            Kind::Toc => self.build_toc(id),
            Kind::Course | Kind::Chapter | Kind::Taskgroup | Kind::Task | Kind::Glossary => {
                self.write_part_page(id)
            }
        }
    }

    /// Stores a freshly built piece value.
    ///
    /// A value equal to the cached one leaves the element `Unchanged` and the
    /// cache untouched, so that dependents are not rebuilt needlessly.
    pub(crate) fn commit_built_value(&mut self, id: ElementId, value: Value) {
        let key = self.element(id).cache_key();
        let (cached, cached_state) = self.cache.read_with_state(&key);
        let same = cached.as_ref() == Some(&value);
        let state = if same {
            State::Unchanged
        } else {
            self.cache.write(&key, value.clone());
            State::Changed
        };
        tracing::trace!(
            target: "sedrila.build",
            key = %key,
            cache = %cached_state,
            same,
            %state,
            "commit built value"
        );
        let element = self.element_mut(id);
        element.value = Some(value);
        element.state = state;
    }

    /// The part an element belongs to; a part belongs to itself.
    pub(crate) fn part_of(&self, id: ElementId) -> SedrilaResult<ElementId> {
        match &self.element(id).detail {
            Detail::OfPart { part } => Ok(*part),
            Detail::Part(_) => Ok(id),
            _ => Err(InternalError::new(format!(
                "{} does not belong to a part",
                self.element(id)
            ))),
        }
    }

    /// The sibling of `kind` registered for the same part name.
    pub(crate) fn sibling(&self, id: ElementId, kind: Kind) -> SedrilaResult<ElementId> {
        let name = &self.element(id).name;
        self.get(kind, name)
            .ok_or_else(|| InternalError::new(format!("no {kind} registered for '{name}'")))
    }
}

fn shape_of(kind: Kind) -> u8 {
    let sample = match kind {
        Kind::Topmatter => Value::Map(Default::default()),
        Kind::IncludeListS | Kind::IncludeListI | Kind::TermrefList => Value::Set(Default::default()),
        Kind::Zipdir => Value::List(Vec::new()),
        _ => Value::Scalar(String::new()),
    };
    sample.shape_tag()
}
