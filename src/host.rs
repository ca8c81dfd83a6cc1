use crate::reflect::TypeInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Reference to a host-managed entity. A handle stays allocated after its entity is destroyed, so
/// callers must ask the [`Host`] whether it is still alive instead of comparing handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle {
    pub id: u32,
    pub generation: u32,
}

impl EntityHandle {
    pub const fn new(id: u32, generation: u32) -> Self {
        Self { id, generation }
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.generation)
    }
}

/// The object system that owns entities, their runtime types and their liveness.
pub trait Host {
    fn is_alive(&self, entity: EntityHandle) -> bool;

    /// Runtime type of a live entity. Destroyed entities report `None`.
    fn type_of(&self, entity: EntityHandle) -> Option<Rc<TypeInfo>>;

    /// Looks a type up by its qualified name. Implementations should accept names in any form
    /// that canonicalizes to a registered type.
    fn resolve_type(&self, type_name: &str) -> Option<Rc<TypeInfo>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    Editor,
    #[default]
    Playing,
}

impl ExecutionContext {
    pub fn is_playing(self) -> bool {
        matches!(self, ExecutionContext::Playing)
    }
}

/// Everything a func needs from its surroundings to rebuild and run its calls.
#[derive(Clone, Copy)]
pub struct InvokeContext<'a> {
    pub host: &'a dyn Host,
    pub execution: ExecutionContext,
}

impl<'a> InvokeContext<'a> {
    pub fn new(host: &'a dyn Host, execution: ExecutionContext) -> Self {
        Self { host, execution }
    }

    pub fn playing(host: &'a dyn Host) -> Self {
        Self::new(host, ExecutionContext::Playing)
    }

    pub fn editor(host: &'a dyn Host) -> Self {
        Self::new(host, ExecutionContext::Editor)
    }
}

impl fmt::Debug for InvokeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeContext").field("execution", &self.execution).finish_non_exhaustive()
    }
}
