use crate::argument_cache::ArgumentCache;
use crate::call_list::CallRef;
use crate::error::BindError;
use crate::host::{EntityHandle, Host, InvokeContext};
use crate::invokable::{CachedInvokableCall, InvokableCall};
use crate::reflect::{find_valid_method, Arg, MethodDescriptor, Signature, ValueType};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Where a persistent call gets its arguments from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PersistentListenerMode {
    /// Arguments come from the caller and match the func's own signature.
    #[default]
    EventDefined,
    Void,
    Object,
    Int,
    Float,
    String,
    Bool,
}

impl PersistentListenerMode {
    pub fn label(self) -> &'static str {
        match self {
            PersistentListenerMode::EventDefined => "Dynamic",
            PersistentListenerMode::Void => "Void",
            PersistentListenerMode::Object => "Object",
            PersistentListenerMode::Int => "Int",
            PersistentListenerMode::Float => "Float",
            PersistentListenerMode::String => "String",
            PersistentListenerMode::Bool => "Bool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallState {
    /// Only called while playing.
    #[default]
    RuntimeOnly,
    Off,
    EditorAndRuntime,
}

/// A serializable listener: a target entity, a method name and how to pass arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentCall {
    target: Option<EntityHandle>,
    method_name: String,
    mode: PersistentListenerMode,
    arguments: ArgumentCache,
    call_state: CallState,
}

impl PersistentCall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn mode(&self) -> PersistentListenerMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PersistentListenerMode) {
        self.mode = mode;
    }

    pub fn arguments(&self) -> &ArgumentCache {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut ArgumentCache {
        &mut self.arguments
    }

    pub fn call_state(&self) -> CallState {
        self.call_state
    }

    pub fn set_call_state(&mut self, state: CallState) {
        self.call_state = state;
    }

    /// A call is worth resolving when its target is alive and it names a method.
    pub fn is_valid(&self, host: &dyn Host) -> bool {
        self.target.is_some_and(|target| host.is_alive(target)) && !self.method_name.is_empty()
    }

    pub fn register(&mut self, target: EntityHandle, method_name: impl Into<String>) {
        self.target = Some(target);
        self.method_name = method_name.into();
    }

    pub fn unregister(&mut self) {
        self.target = None;
        self.method_name.clear();
    }

    /// Argument types the target method must accept for this call's mode. `A` is the owning func's
    /// signature, used by [`PersistentListenerMode::EventDefined`].
    pub fn requested_params<A: Signature>(&self, host: &dyn Host) -> Vec<ValueType> {
        match self.mode {
            PersistentListenerMode::EventDefined => A::param_types(),
            PersistentListenerMode::Void => Vec::new(),
            PersistentListenerMode::Int => vec![ValueType::Int],
            PersistentListenerMode::Float => vec![ValueType::Float],
            PersistentListenerMode::Bool => vec![ValueType::Bool],
            PersistentListenerMode::String => vec![ValueType::Str],
            PersistentListenerMode::Object => vec![self.arguments.object_argument_type(host)],
        }
    }

    pub fn find_method<A: Signature>(&self, host: &dyn Host) -> Result<Rc<MethodDescriptor>, BindError> {
        let target = self.target.ok_or(BindError::MissingTarget)?;
        let ty = host.type_of(target).ok_or(BindError::DeadTarget(target))?;
        find_valid_method(&ty, &self.method_name, &self.requested_params::<A>(host), host).ok_or_else(|| {
            BindError::MethodNotFound { type_name: ty.name().to_string(), method: self.method_name.clone() }
        })
    }

    /// Builds the executable form of this call for a func with signature `A -> R`.
    ///
    /// `Ok(None)` when the call is switched off, or editor-only data is asked for outside play.
    pub fn runtime_call<A: Signature, R: Arg>(&self, cx: &InvokeContext<'_>) -> Result<Option<CallRef<R>>, BindError> {
        match self.call_state {
            CallState::Off => return Ok(None),
            CallState::RuntimeOnly if !cx.execution.is_playing() => return Ok(None),
            _ => {}
        }
        let target = self.target.ok_or(BindError::MissingTarget)?;
        let method = self.find_method::<A>(cx.host)?;
        let args = &self.arguments;
        let call: CallRef<R> = match self.mode {
            PersistentListenerMode::EventDefined => Rc::new(InvokableCall::<A, R>::from_method(target, method)?),
            PersistentListenerMode::Void => Rc::new(InvokableCall::<(), R>::from_method(target, method)?),
            PersistentListenerMode::Int => {
                Rc::new(CachedInvokableCall::<i32, R>::from_method(target, method, args.int_argument())?)
            }
            PersistentListenerMode::Float => {
                Rc::new(CachedInvokableCall::<f32, R>::from_method(target, method, args.float_argument())?)
            }
            PersistentListenerMode::Bool => {
                Rc::new(CachedInvokableCall::<bool, R>::from_method(target, method, args.bool_argument())?)
            }
            PersistentListenerMode::String => Rc::new(CachedInvokableCall::<String, R>::from_method(
                target,
                method,
                args.string_argument().to_string(),
            )?),
            PersistentListenerMode::Object => {
                let argument = self.object_argument(cx.host);
                Rc::new(CachedInvokableCall::<Option<EntityHandle>, R>::from_method(target, method, argument)?)
            }
        };
        Ok(Some(call))
    }

    /// The cached entity argument, or null when it no longer has the type the call was saved with.
    fn object_argument(&self, host: &dyn Host) -> Option<EntityHandle> {
        let argument = self.arguments.object_argument()?;
        let ValueType::Entity(expected) = self.arguments.object_argument_type(host) else {
            return None;
        };
        match host.type_of(argument) {
            Some(ty) if !ty.derives_from(&expected) => {
                log::debug!(
                    "[func] object argument {argument} of '{}' is a '{}', expected '{expected}'; passing null",
                    self.method_name,
                    ty.name()
                );
                None
            }
            _ => Some(argument),
        }
    }
}
