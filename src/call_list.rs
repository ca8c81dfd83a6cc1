use crate::host::EntityHandle;
use crate::invokable::Invocable;
use crate::reflect::MethodKey;
use std::rc::Rc;

pub type CallRef<R> = Rc<dyn Invocable<R>>;

/// Persistent and runtime calls plus the merged sequence that is actually executed.
///
/// Whenever the list is not dirty, `executing` holds the persistent calls in order followed by
/// the runtime calls in order, as of the last [`prepare_invoke`](Self::prepare_invoke).
pub struct InvokableCallList<R> {
    persistent: Vec<CallRef<R>>,
    runtime: Vec<CallRef<R>>,
    executing: Vec<CallRef<R>>,
    needs_update: bool,
}

impl<R> Default for InvokableCallList<R> {
    fn default() -> Self {
        Self { persistent: Vec::new(), runtime: Vec::new(), executing: Vec::new(), needs_update: true }
    }
}

impl<R> InvokableCallList<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.persistent.len() + self.runtime.len()
    }

    pub fn persistent_count(&self) -> usize {
        self.persistent.len()
    }

    pub fn runtime_count(&self) -> usize {
        self.runtime.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.needs_update
    }

    pub fn add_persistent(&mut self, call: CallRef<R>) {
        self.persistent.push(call);
        self.needs_update = true;
    }

    pub fn add_runtime(&mut self, call: CallRef<R>) {
        self.runtime.push(call);
        self.needs_update = true;
    }

    /// Drops every runtime call bound to `target` and `method`.
    pub fn remove_runtime(&mut self, target: Option<EntityHandle>, method: &MethodKey) {
        self.runtime.retain(|call| !call.matches(target, method));
        self.needs_update = true;
    }

    pub fn clear_runtime(&mut self) {
        self.runtime.clear();
        self.needs_update = true;
    }

    pub fn clear_persistent(&mut self) {
        self.persistent.clear();
        self.needs_update = true;
    }

    pub fn prepare_invoke(&mut self) -> &[CallRef<R>] {
        if self.needs_update {
            self.executing.clear();
            self.executing.extend(self.persistent.iter().cloned());
            self.executing.extend(self.runtime.iter().cloned());
            self.needs_update = false;
        }
        &self.executing
    }
}
