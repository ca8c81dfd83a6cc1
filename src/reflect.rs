use crate::argument_cache::canonical_type_name;
use crate::host::{EntityHandle, Host};
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Qualified name of the root type every host entity type derives from.
pub const ENTITY_TYPE_NAME: &str = "Kestrel.Entity, KestrelEngine";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Unit,
    Int,
    Float,
    Bool,
    Str,
    Entity(String),
    Any,
}

impl ValueType {
    pub fn entity() -> Self {
        ValueType::Entity(ENTITY_TYPE_NAME.to_string())
    }

    pub fn entity_of(type_name: &str) -> Self {
        ValueType::Entity(canonical_type_name(type_name))
    }

    /// Value types passed by copy. Strings and references are not primitive.
    pub fn is_primitive(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float | ValueType::Bool)
    }

    pub fn accepts(&self, requested: &ValueType, host: &dyn Host) -> bool {
        match (self, requested) {
            (ValueType::Any, requested) => *requested != ValueType::Unit,
            (ValueType::Entity(declared), ValueType::Entity(requested)) => {
                declared == requested
                    || host.resolve_type(requested).is_some_and(|ty| ty.derives_from(declared))
            }
            (declared, requested) => declared == requested,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Unit => f.write_str("void"),
            ValueType::Int => f.write_str("int"),
            ValueType::Float => f.write_str("float"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Str => f.write_str("string"),
            ValueType::Entity(name) => f.write_str(name),
            ValueType::Any => f.write_str("any"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
    Entity(Option<EntityHandle>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Unit => ValueType::Unit,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::Str(_) => ValueType::Str,
            Value::Entity(_) => ValueType::entity(),
        }
    }

    /// Dynamic type test. Null and destroyed entities fit any entity type; a live one must derive
    /// from it.
    pub fn is_assignable_to(&self, declared: &ValueType, host: &dyn Host) -> bool {
        match (self, declared) {
            (Value::Unit, ValueType::Any) => false,
            (_, ValueType::Any) => true,
            (Value::Entity(None), ValueType::Entity(_)) => true,
            (Value::Entity(Some(entity)), ValueType::Entity(name)) => {
                host.type_of(*entity).map_or(true, |ty| ty.derives_from(name))
            }
            (value, declared) => value.value_type() == *declared,
        }
    }
}

pub trait Arg: Clone + 'static {
    fn value_type() -> ValueType;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_arg {
    ($ty:ty, $variant:ident, $value_type:expr) => {
        impl Arg for $ty {
            fn value_type() -> ValueType {
                $value_type
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_arg!(i32, Int, ValueType::Int);
impl_arg!(f32, Float, ValueType::Float);
impl_arg!(bool, Bool, ValueType::Bool);
impl_arg!(String, Str, ValueType::Str);
impl_arg!(Option<EntityHandle>, Entity, ValueType::entity());

impl Arg for () {
    fn value_type() -> ValueType {
        ValueType::Unit
    }

    fn into_value(self) -> Value {
        Value::Unit
    }

    fn from_value(value: Value) -> Option<Self> {
        matches!(value, Value::Unit).then_some(())
    }
}

impl Arg for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

pub type ArgValues = SmallVec<[Value; 4]>;

pub trait Signature: Clone + 'static {
    const ARITY: usize;

    fn param_types() -> Vec<ValueType>;
    fn into_values(self) -> ArgValues;
    fn from_values(values: &[Value]) -> Option<Self>;
}

macro_rules! impl_signature {
    ($arity:expr; $($T:ident $idx:tt),*) => {
        impl<$($T: Arg),*> Signature for ($($T,)*) {
            const ARITY: usize = $arity;

            fn param_types() -> Vec<ValueType> {
                vec![$($T::value_type()),*]
            }

            fn into_values(self) -> ArgValues {
                smallvec![$(self.$idx.into_value()),*]
            }

            fn from_values(values: &[Value]) -> Option<Self> {
                if values.len() != $arity {
                    return None;
                }
                Some(($($T::from_value(values[$idx].clone())?,)*))
            }
        }
    };
}

impl_signature!(0;);
impl_signature!(1; T0 0);
impl_signature!(2; T0 0, T1 1);
impl_signature!(3; T0 0, T1 1, T2 2);
impl_signature!(4; T0 0, T1 1, T2 2, T3 3);

/// Identity of a method for listener removal. Two lookups of the same method produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    owner: Option<String>,
    name: String,
    params: Vec<ValueType>,
    anonymous: bool,
}

static NEXT_CLOSURE_ID: AtomicU64 = AtomicU64::new(1);

impl MethodKey {
    pub fn new(owner: Option<String>, name: impl Into<String>, params: Vec<ValueType>) -> Self {
        Self { owner, name: name.into(), params, anonymous: false }
    }

    pub fn named(name: impl Into<String>, params: Vec<ValueType>) -> Self {
        Self::new(None, name, params)
    }

    pub(crate) fn anonymous(params: Vec<ValueType>) -> Self {
        let id = NEXT_CLOSURE_ID.fetch_add(1, Ordering::Relaxed);
        Self { owner: None, name: format!("<closure #{id}>"), params, anonymous: true }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

pub type MethodFn = Rc<dyn Fn(Option<EntityHandle>, &[Value]) -> Value>;

#[derive(Clone)]
pub struct MethodDescriptor {
    owner: String,
    name: String,
    params: Vec<ValueType>,
    returns: ValueType,
    is_static: bool,
    invoker: MethodFn,
}

impl MethodDescriptor {
    /// `invoker` receives the target entity (`None` for static methods) and arguments that have
    /// already been checked against `params`.
    pub fn new(
        name: impl Into<String>,
        params: Vec<ValueType>,
        returns: ValueType,
        invoker: impl Fn(Option<EntityHandle>, &[Value]) -> Value + 'static,
    ) -> Self {
        Self {
            owner: String::new(),
            name: name.into(),
            params,
            returns,
            is_static: false,
            invoker: Rc::new(invoker),
        }
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn returns(&self) -> &ValueType {
        &self.returns
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn key(&self) -> MethodKey {
        MethodKey::new(Some(self.owner.clone()), self.name.clone(), self.params.clone())
    }

    pub(crate) fn call(&self, target: Option<EntityHandle>, args: &[Value]) -> Value {
        (self.invoker)(target, args)
    }
}

impl PartialEq for MethodDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner
            && self.name == other.name
            && self.params == other.params
            && self.returns == other.returns
            && self.is_static == other.is_static
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("is_static", &self.is_static)
            .finish()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.returns, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

pub struct TypeInfo {
    name: String,
    base: Option<Rc<TypeInfo>>,
    methods: Vec<Rc<MethodDescriptor>>,
}

impl TypeInfo {
    pub fn builder(name: impl AsRef<str>) -> TypeBuilder {
        TypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Rc<TypeInfo>> {
        self.base.as_ref()
    }

    pub fn methods(&self) -> &[Rc<MethodDescriptor>] {
        &self.methods
    }

    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    pub fn derives_from(&self, type_name: &str) -> bool {
        let wanted = canonical_type_name(type_name);
        self.ancestors().any(|ty| ty.name == wanted)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|base| base.name.as_str()))
            .field("methods", &self.methods.len())
            .finish()
    }
}

pub struct Ancestors<'a> {
    next: Option<&'a TypeInfo>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a TypeInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.base.as_deref();
        Some(current)
    }
}

pub struct TypeBuilder {
    name: String,
    base: Option<Rc<TypeInfo>>,
    methods: Vec<MethodDescriptor>,
}

impl TypeBuilder {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self { name: canonical_type_name(name.as_ref()), base: None, methods: Vec::new() }
    }

    pub fn extends(mut self, base: &Rc<TypeInfo>) -> Self {
        self.base = Some(Rc::clone(base));
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    pub fn build(self) -> Rc<TypeInfo> {
        let owner = self.name.clone();
        let methods = self
            .methods
            .into_iter()
            .map(|mut method| {
                method.owner = owner.clone();
                Rc::new(method)
            })
            .collect();
        Rc::new(TypeInfo { name: self.name, base: self.base, methods })
    }
}

/// Nearest instance method on `ty` or its bases whose parameters accept `requested` and agree on
/// primitive vs non-primitive category.
pub fn find_valid_method(
    ty: &TypeInfo,
    name: &str,
    requested: &[ValueType],
    host: &dyn Host,
) -> Option<Rc<MethodDescriptor>> {
    ty.ancestors().find_map(|ty| {
        ty.methods
            .iter()
            .find(|method| {
                !method.is_static
                    && method.name == name
                    && method.params.len() == requested.len()
                    && method.params.iter().zip(requested).all(|(declared, requested)| {
                        declared.accepts(requested, host) && declared.is_primitive() == requested.is_primitive()
                    })
            })
            .cloned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    fn noop(_: Option<EntityHandle>, _: &[Value]) -> Value {
        Value::Unit
    }

    #[test]
    fn lookup_walks_ancestors_nearest_first() {
        let mut world = World::new();
        let base = world.register_type(
            TypeInfo::builder("Game.Actor, Game")
                .method(MethodDescriptor::new("hit", vec![ValueType::Int], ValueType::Unit, noop))
                .method(MethodDescriptor::new("heal", vec![], ValueType::Unit, noop)),
        );
        let derived = world.register_type(
            TypeInfo::builder("Game.Player, Game")
                .extends(&base)
                .method(MethodDescriptor::new("hit", vec![ValueType::Int], ValueType::Unit, noop)),
        );

        let hit = find_valid_method(&derived, "hit", &[ValueType::Int], &world).expect("hit");
        assert_eq!(hit.owner(), "Game.Player, Game");
        let heal = find_valid_method(&derived, "heal", &[], &world).expect("heal");
        assert_eq!(heal.owner(), "Game.Actor, Game");
        assert!(find_valid_method(&derived, "heal", &[ValueType::Int], &world).is_none());
    }

    #[test]
    fn primitive_request_never_binds_to_reference_parameter() {
        let mut world = World::new();
        let ty = world.register_type(
            TypeInfo::builder("Game.Lamp, Game")
                .method(MethodDescriptor::new("dim", vec![ValueType::Any], ValueType::Unit, noop))
                .method(MethodDescriptor::new("label", vec![ValueType::Any], ValueType::Unit, noop)),
        );

        assert!(find_valid_method(&ty, "dim", &[ValueType::Float], &world).is_none());
        assert!(find_valid_method(&ty, "label", &[ValueType::Str], &world).is_some());
    }

    #[test]
    fn static_methods_are_not_resolved() {
        let mut world = World::new();
        let ty = world.register_type(
            TypeInfo::builder("Game.Spawner, Game")
                .method(MethodDescriptor::new("create", vec![], ValueType::Unit, noop).into_static()),
        );
        assert!(find_valid_method(&ty, "create", &[], &world).is_none());
    }

    #[test]
    fn entity_parameters_accept_derived_types() {
        let mut world = World::new();
        world.register_type(TypeInfo::builder("Game.Door, Game"));
        let ty = world.register_type(TypeInfo::builder("Game.Lock, Game").method(MethodDescriptor::new(
            "attach",
            vec![ValueType::entity_of("Game.Door, Game")],
            ValueType::Unit,
            noop,
        )));

        assert!(find_valid_method(&ty, "attach", &[ValueType::entity_of("Game.Door, Game")], &world).is_some());
        assert!(find_valid_method(&ty, "attach", &[ValueType::entity()], &world).is_none());
    }

    #[test]
    fn method_keys_compare_by_signature() {
        let ty = TypeInfo::builder("Game.Door, Game")
            .method(MethodDescriptor::new("open", vec![ValueType::Int], ValueType::Int, noop))
            .build();
        let again = TypeInfo::builder("Game.Door, Game")
            .method(MethodDescriptor::new("open", vec![ValueType::Int], ValueType::Int, noop))
            .build();
        assert_eq!(ty.methods()[0].key(), again.methods()[0].key());
        assert_eq!(*ty.methods()[0], *again.methods()[0]);
        assert_ne!(MethodKey::anonymous(vec![]), MethodKey::anonymous(vec![]));
    }
}
