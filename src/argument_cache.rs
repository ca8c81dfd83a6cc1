use crate::host::{EntityHandle, Host};
use crate::reflect::ValueType;
use serde::{Deserialize, Serialize};

const VERSION_MARKERS: [&str; 3] = [", Version=", ", Culture=", ", PublicKeyToken="];
const MODULE_MARKER: &str = ", KestrelEngine.";
const MODULE_SUFFIX: &str = "Module";
const ENGINE_ASSEMBLY: &str = ", KestrelEngine";

/// Reduces a qualified type name to `<namespaces>.<type>, <assembly>`.
///
/// Version, culture and signing-key suffixes are cut at the first marker, and engine module
/// assemblies (`, KestrelEngine.PhysicsModule`) collapse to `, KestrelEngine` so data saved before a
/// type moved between modules still resolves.
pub fn canonical_type_name(name: &str) -> String {
    let name = match VERSION_MARKERS.iter().filter_map(|marker| name.find(marker)).min() {
        Some(cut) => &name[..cut],
        None => name,
    };
    if let Some(module) = name.find(MODULE_MARKER) {
        if name.ends_with(MODULE_SUFFIX) {
            return format!("{}{}", &name[..module], ENGINE_ASSEMBLY);
        }
    }
    name.to_string()
}

/// The literal argument stored by a persistent call. Only the field selected by the owning call's
/// mode is meaningful; the others are kept so switching modes in an editor is lossless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ArgumentCacheRecord", into = "ArgumentCacheRecord")]
pub struct ArgumentCache {
    object_arg: Option<EntityHandle>,
    object_arg_type_name: String,
    int_arg: i32,
    float_arg: f32,
    string_arg: String,
    bool_arg: bool,
}

/// On-disk layout of an [`ArgumentCache`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArgumentCacheRecord {
    pub int_arg: i32,
    pub float_arg: f32,
    pub string_arg: String,
    pub bool_arg: bool,
    pub object_arg: Option<EntityHandle>,
    pub object_arg_type_name: String,
}

impl From<ArgumentCacheRecord> for ArgumentCache {
    fn from(record: ArgumentCacheRecord) -> Self {
        let mut cache = Self {
            object_arg: record.object_arg,
            object_arg_type_name: record.object_arg_type_name,
            int_arg: record.int_arg,
            float_arg: record.float_arg,
            string_arg: record.string_arg,
            bool_arg: record.bool_arg,
        };
        cache.tidy_type_name();
        cache
    }
}

impl From<ArgumentCache> for ArgumentCacheRecord {
    fn from(mut cache: ArgumentCache) -> Self {
        cache.tidy_type_name();
        Self {
            int_arg: cache.int_arg,
            float_arg: cache.float_arg,
            string_arg: cache.string_arg,
            bool_arg: cache.bool_arg,
            object_arg: cache.object_arg,
            object_arg_type_name: cache.object_arg_type_name,
        }
    }
}

impl ArgumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int_argument(&self) -> i32 {
        self.int_arg
    }

    pub fn set_int_argument(&mut self, value: i32) {
        self.int_arg = value;
    }

    pub fn float_argument(&self) -> f32 {
        self.float_arg
    }

    pub fn set_float_argument(&mut self, value: f32) {
        self.float_arg = value;
    }

    pub fn string_argument(&self) -> &str {
        &self.string_arg
    }

    pub fn set_string_argument(&mut self, value: impl Into<String>) {
        self.string_arg = value.into();
    }

    pub fn bool_argument(&self) -> bool {
        self.bool_arg
    }

    pub fn set_bool_argument(&mut self, value: bool) {
        self.bool_arg = value;
    }

    pub fn object_argument(&self) -> Option<EntityHandle> {
        self.object_arg
    }

    pub fn object_argument_type_name(&self) -> &str {
        &self.object_arg_type_name
    }

    /// Stores an entity argument and records its runtime type name. A null or destroyed entity
    /// clears the type name.
    pub fn set_object_argument(&mut self, host: &dyn Host, value: Option<EntityHandle>) {
        self.object_arg = value;
        self.object_arg_type_name = value
            .and_then(|entity| host.type_of(entity))
            .map(|ty| canonical_type_name(ty.name()))
            .unwrap_or_default();
    }

    /// Parameter type an object-mode call expects. Names that no longer resolve fall back to the
    /// root entity type.
    pub fn object_argument_type(&self, host: &dyn Host) -> ValueType {
        if self.object_arg_type_name.is_empty() {
            return ValueType::entity();
        }
        match host.resolve_type(&self.object_arg_type_name) {
            Some(ty) => ValueType::Entity(ty.name().to_string()),
            None => ValueType::entity(),
        }
    }

    pub fn tidy_type_name(&mut self) {
        if self.object_arg_type_name.is_empty() {
            return;
        }
        self.object_arg_type_name = canonical_type_name(&self.object_arg_type_name);
    }
}
