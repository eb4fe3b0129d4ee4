//! Builds the driver `Program` for one test.

use crate::error::HarnessError;
use rvt_core::{DataItem, DumpPlan, Program, Slot, SlotValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProgramSynthesizer {
    name: String,
    target: PathBuf,
    includes: Vec<PathBuf>,
    runtime: Option<PathBuf>,
    bindings: BTreeMap<Slot, SlotValue>,
    routine: Option<String>,
}

impl ProgramSynthesizer {
    #[must_use]
    pub fn new(name: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            includes: Vec::new(),
            runtime: None,
            bindings: BTreeMap::new(),
            routine: None,
        }
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: Option<PathBuf>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn set_runtime(&mut self, runtime: Option<PathBuf>) {
        self.runtime = runtime;
    }

    /// Rebinding a slot replaces the earlier value.
    pub fn bind(&mut self, slot: Slot, value: SlotValue) {
        self.bindings.insert(slot, value);
    }

    /// Adds a dependency. Duplicates and the target itself are ignored;
    /// first-include order is kept.
    pub fn include(&mut self, source: impl Into<PathBuf>) {
        let source = source.into();
        if source == self.target || self.includes.contains(&source) {
            return;
        }
        self.includes.push(source);
    }

    pub fn call(&mut self, routine: impl Into<String>) {
        self.routine = Some(routine.into());
    }

    /// Imports in link order: target, includes, runtime.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.target.as_path())
            .chain(self.includes.iter().map(PathBuf::as_path))
            .chain(self.runtime.as_deref())
    }

    /// Deterministic in its inputs: building twice yields equal programs.
    pub fn build(&self, data: &[DataItem], dump: DumpPlan) -> Result<Program, HarnessError> {
        let routine = self.routine.clone().ok_or(HarnessError::UnboundCall)?;
        let mut imports = Vec::with_capacity(1 + self.includes.len());
        imports.push(self.target.clone());
        imports.extend(self.includes.iter().cloned());
        Ok(Program {
            name: self.name.clone(),
            imports,
            runtime: self.runtime.clone(),
            data: data.to_vec(),
            bindings: self
                .bindings
                .iter()
                .map(|(slot, value)| (*slot, value.clone()))
                .collect(),
            routine,
            dump,
        })
    }
}
