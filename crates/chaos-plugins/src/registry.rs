use std::collections::BTreeMap;

use crate::error::RegistryError;
use crate::step::DynStep;

/// Fixed set of steps, built once at startup. Registration order is kept for
/// error messages and the schema document.
pub struct StepRegistry {
    steps: Vec<Box<dyn DynStep>>,
    by_id: BTreeMap<&'static str, usize>,
}

impl StepRegistry {
    pub fn new(steps: Vec<Box<dyn DynStep>>) -> Result<Self, RegistryError> {
        let mut by_id = BTreeMap::new();
        for (index, step) in steps.iter().enumerate() {
            if by_id.insert(step.id(), index).is_some() {
                return Err(RegistryError::DuplicateStep { id: step.id() });
            }
        }
        Ok(Self { steps, by_id })
    }

    pub fn get(&self, id: &str) -> Option<&dyn DynStep> {
        self.by_id
            .get(id)
            .and_then(|index| self.steps.get(*index))
            .map(|step| step.as_ref())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.id()).collect()
    }

    pub fn steps(&self) -> impl Iterator<Item = &dyn DynStep> {
        self.steps.iter().map(|step| step.as_ref())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
