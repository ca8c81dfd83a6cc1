use crate::call_list::InvokableCallList;
use crate::host::{EntityHandle, Host, InvokeContext};
use crate::persistent::{PersistentCall, PersistentListenerMode};
use crate::reflect::{Arg, Signature};
use anyhow::{bail, Context, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const BINARY_MAGIC: &[u8; 4] = b"KFNC";
const BINARY_VERSION: u32 = 1;
pub const BINARY_EXTENSION: &str = "kfunc";

/// How many bindings a rebuild turned into calls, and how many it could not resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub resolved: usize,
    pub skipped: usize,
    pub unresolved: usize,
}

/// The ordered list of persistent calls owned by a func.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistentCallGroup {
    calls: Vec<PersistentCall>,
}

impl PersistentCallGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn listener(&self, index: usize) -> Option<&PersistentCall> {
        self.calls.get(index)
    }

    pub fn listener_mut(&mut self, index: usize) -> Option<&mut PersistentCall> {
        self.calls.get_mut(index)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &PersistentCall> {
        self.calls.iter()
    }

    /// Appends an empty call and returns its index.
    pub fn add_listener(&mut self) -> usize {
        self.calls.push(PersistentCall::new());
        self.calls.len() - 1
    }

    pub fn remove_listener(&mut self, index: usize) -> Option<PersistentCall> {
        (index < self.calls.len()).then(|| self.calls.remove(index))
    }

    /// Removes every call bound to `method_name` on `target`, returning how many were dropped.
    pub fn remove_listeners(&mut self, target: EntityHandle, method_name: &str) -> usize {
        let before = self.calls.len();
        self.calls.retain(|call| !(call.target() == Some(target) && call.method_name() == method_name));
        before - self.calls.len()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    fn register_as(
        &mut self,
        index: usize,
        target: EntityHandle,
        method_name: &str,
        mode: PersistentListenerMode,
    ) -> Option<&mut PersistentCall> {
        let call = self.calls.get_mut(index)?;
        call.register(target, method_name);
        call.set_mode(mode);
        Some(call)
    }

    pub fn register_event_listener(&mut self, index: usize, target: EntityHandle, method_name: &str) -> bool {
        self.register_as(index, target, method_name, PersistentListenerMode::EventDefined).is_some()
    }

    pub fn register_void_listener(&mut self, index: usize, target: EntityHandle, method_name: &str) -> bool {
        self.register_as(index, target, method_name, PersistentListenerMode::Void).is_some()
    }

    pub fn register_int_listener(&mut self, index: usize, target: EntityHandle, argument: i32, method_name: &str) -> bool {
        self.register_as(index, target, method_name, PersistentListenerMode::Int)
            .map(|call| call.arguments_mut().set_int_argument(argument))
            .is_some()
    }

    pub fn register_float_listener(
        &mut self,
        index: usize,
        target: EntityHandle,
        argument: f32,
        method_name: &str,
    ) -> bool {
        self.register_as(index, target, method_name, PersistentListenerMode::Float)
            .map(|call| call.arguments_mut().set_float_argument(argument))
            .is_some()
    }

    pub fn register_bool_listener(&mut self, index: usize, target: EntityHandle, argument: bool, method_name: &str) -> bool {
        self.register_as(index, target, method_name, PersistentListenerMode::Bool)
            .map(|call| call.arguments_mut().set_bool_argument(argument))
            .is_some()
    }

    pub fn register_string_listener(
        &mut self,
        index: usize,
        target: EntityHandle,
        argument: impl Into<String>,
        method_name: &str,
    ) -> bool {
        self.register_as(index, target, method_name, PersistentListenerMode::String)
            .map(|call| call.arguments_mut().set_string_argument(argument))
            .is_some()
    }

    pub fn register_object_listener(
        &mut self,
        host: &dyn Host,
        index: usize,
        target: EntityHandle,
        argument: Option<EntityHandle>,
        method_name: &str,
    ) -> bool {
        self.register_as(index, target, method_name, PersistentListenerMode::Object)
            .map(|call| call.arguments_mut().set_object_argument(host, argument))
            .is_some()
    }

    pub fn unregister_listener(&mut self, index: usize) -> bool {
        self.calls.get_mut(index).map(PersistentCall::unregister).is_some()
    }

    /// Resolves every valid call, in order, onto the persistent side of `list`.
    ///
    /// Calls that cannot be resolved contribute nothing; they are logged when `warn_unresolved`.
    pub fn initialize<A: Signature, R: Arg>(
        &self,
        list: &mut InvokableCallList<R>,
        cx: &InvokeContext<'_>,
        warn_unresolved: bool,
    ) -> ResolveSummary {
        let mut summary = ResolveSummary::default();
        for (index, call) in self.calls.iter().enumerate() {
            if !call.is_valid(cx.host) {
                summary.skipped += 1;
                continue;
            }
            match call.runtime_call::<A, R>(cx) {
                Ok(Some(runtime)) => {
                    list.add_persistent(runtime);
                    summary.resolved += 1;
                }
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    summary.unresolved += 1;
                    if warn_unresolved {
                        log::warn!("[func] persistent listener {index} ('{}') not bound: {err}", call.method_name());
                    }
                }
            }
        }
        summary
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing persistent calls to JSON")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Parsing persistent calls JSON")
    }

    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let payload = bincode_options().serialize(self).context("Encoding persistent calls")?;
        let mut bytes = Vec::with_capacity(BINARY_MAGIC.len() + 4 + payload.len());
        bytes.extend_from_slice(BINARY_MAGIC);
        bytes.extend_from_slice(&BINARY_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self> {
        let header = BINARY_MAGIC.len() + 4;
        if bytes.len() < header || &bytes[..BINARY_MAGIC.len()] != BINARY_MAGIC {
            bail!("Not a binary persistent call file (missing KFNC header)");
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[BINARY_MAGIC.len()..header]);
        let version = u32::from_le_bytes(version);
        if version != BINARY_VERSION {
            bail!("Unsupported persistent call format version {version} (expected {BINARY_VERSION})");
        }
        bincode_options().deserialize(&bytes[header..]).context("Decoding persistent calls")
    }

    /// Loads a `.kfunc` binary file or, for any other extension, JSON.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading persistent calls {}", path.display()))?;
        let group = if is_binary_path(path) {
            Self::from_binary(&bytes)
        } else {
            let json = std::str::from_utf8(&bytes).context("Persistent call file is not UTF-8")?;
            Self::from_json(json)
        };
        group.with_context(|| format!("Loading persistent calls {}", path.display()))
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating persistent call directory {}", parent.display()))?;
        }
        let bytes = if is_binary_path(path) { self.to_binary()? } else { self.to_json()?.into_bytes() };
        fs::write(path, bytes).with_context(|| format!("Writing persistent calls {}", path.display()))?;
        Ok(())
    }
}

fn is_binary_path(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case(BINARY_EXTENSION))
}

fn bincode_options() -> impl bincode::Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::CallState;

    fn handle(id: u32) -> EntityHandle {
        EntityHandle::new(id, 0)
    }

    #[test]
    fn register_setters_assign_target_method_and_mode() {
        let mut group = PersistentCallGroup::new();
        let index = group.add_listener();
        assert!(group.register_int_listener(index, handle(1), 7, "set_level"));
        let call = group.listener(index).expect("call");
        assert_eq!(call.target(), Some(handle(1)));
        assert_eq!(call.method_name(), "set_level");
        assert_eq!(call.mode(), PersistentListenerMode::Int);
        assert_eq!(call.arguments().int_argument(), 7);
        assert_eq!(call.call_state(), CallState::RuntimeOnly);
        assert!(!group.register_void_listener(5, handle(1), "open"));
    }

    #[test]
    fn remove_listeners_matches_target_and_name() {
        let mut group = PersistentCallGroup::new();
        for (id, name) in [(1, "open"), (2, "open"), (1, "close"), (1, "open")] {
            let index = group.add_listener();
            group.register_void_listener(index, handle(id), name);
        }
        assert_eq!(group.remove_listeners(handle(1), "open"), 2);
        let left: Vec<_> = group.listeners().map(|call| (call.target(), call.method_name().to_string())).collect();
        assert_eq!(left, vec![(Some(handle(2)), "open".to_string()), (Some(handle(1)), "close".to_string())]);
    }

    #[test]
    fn unregister_clears_target_and_method() {
        let mut group = PersistentCallGroup::new();
        let index = group.add_listener();
        group.register_event_listener(index, handle(3), "ping");
        assert!(group.unregister_listener(index));
        let call = group.listener(index).expect("call");
        assert_eq!(call.target(), None);
        assert!(call.method_name().is_empty());
        assert_eq!(group.count(), 1);
    }

    #[test]
    fn json_layout_uses_documented_field_names() {
        let mut group = PersistentCallGroup::new();
        let index = group.add_listener();
        group.register_string_listener(index, handle(9), "hello", "say");
        let value: serde_json::Value = serde_json::from_str(&group.to_json().expect("json")).expect("parse");
        let record = &value[0];
        assert_eq!(record["methodName"], "say");
        assert_eq!(record["mode"], "String");
        assert_eq!(record["callState"], "RuntimeOnly");
        assert_eq!(record["target"]["id"], 9);
        assert_eq!(record["arguments"]["stringArg"], "hello");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let group = PersistentCallGroup::from_json(r#"[{ "methodName": "open" }]"#).expect("json");
        let call = group.listener(0).expect("call");
        assert_eq!(call.mode(), PersistentListenerMode::EventDefined);
        assert_eq!(call.call_state(), CallState::RuntimeOnly);
        assert_eq!(call.target(), None);
    }

    #[test]
    fn binary_rejects_foreign_bytes() {
        assert!(PersistentCallGroup::from_binary(b"nope").is_err());
        let mut bytes = PersistentCallGroup::new().to_binary().expect("binary");
        bytes[4] = 9;
        assert!(PersistentCallGroup::from_binary(&bytes).is_err());
    }
}
