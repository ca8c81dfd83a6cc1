use crate::call_list::{CallRef, InvokableCallList};
use crate::config::FuncConfig;
use crate::error::{BindError, InvokeError};
use crate::host::{EntityHandle, ExecutionContext, Host, InvokeContext};
use crate::invokable::{check_binding, Delegate, InvokableCall};
use crate::persistent::{CallState, PersistentCall};
use crate::persistent_group::PersistentCallGroup;
use crate::reflect::{find_valid_method, Arg, MethodDescriptor, MethodKey, Signature, Value, ValueType};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

pub trait CachedArg: Arg {
    /// Parameter type the target method must accept for this argument.
    fn requested_type(&self, _host: &dyn Host) -> ValueType {
        Self::value_type()
    }

    fn store(self, group: &mut PersistentCallGroup, host: &dyn Host, index: usize, target: EntityHandle, method: &str);
}

impl CachedArg for i32 {
    fn store(self, group: &mut PersistentCallGroup, _: &dyn Host, index: usize, target: EntityHandle, method: &str) {
        group.register_int_listener(index, target, self, method);
    }
}

impl CachedArg for f32 {
    fn store(self, group: &mut PersistentCallGroup, _: &dyn Host, index: usize, target: EntityHandle, method: &str) {
        group.register_float_listener(index, target, self, method);
    }
}

impl CachedArg for bool {
    fn store(self, group: &mut PersistentCallGroup, _: &dyn Host, index: usize, target: EntityHandle, method: &str) {
        group.register_bool_listener(index, target, self, method);
    }
}

impl CachedArg for String {
    fn store(self, group: &mut PersistentCallGroup, _: &dyn Host, index: usize, target: EntityHandle, method: &str) {
        group.register_string_listener(index, target, self, method);
    }
}

impl CachedArg for Option<EntityHandle> {
    fn requested_type(&self, host: &dyn Host) -> ValueType {
        self.and_then(|entity| host.type_of(entity))
            .map(|ty| ValueType::Entity(ty.name().to_string()))
            .unwrap_or_else(ValueType::entity)
    }

    fn store(self, group: &mut PersistentCallGroup, host: &dyn Host, index: usize, target: EntityHandle, method: &str) {
        group.register_object_listener(host, index, target, self, method);
    }
}

/// Persistent listeners run before runtime ones; the last listener that ran supplies the result.
pub struct Func<A, R> {
    persistent_calls: PersistentCallGroup,
    calls: InvokableCallList<R>,
    calls_dirty: bool,
    // Execution context the persistent calls were last resolved for.
    built_for: Option<ExecutionContext>,
    config: FuncConfig,
    _signature: PhantomData<fn(A) -> R>,
}

impl<A: Signature, R: Arg + Default> Default for Func<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Signature, R: Arg + Default> Func<A, R> {
    pub fn new() -> Self {
        Self::with_config(FuncConfig::default())
    }

    pub fn with_config(config: FuncConfig) -> Self {
        Self {
            persistent_calls: PersistentCallGroup::new(),
            calls: InvokableCallList::new(),
            calls_dirty: true,
            built_for: None,
            config,
            _signature: PhantomData,
        }
    }

    pub fn from_persistent_calls(persistent_calls: PersistentCallGroup) -> Self {
        Self { persistent_calls, ..Self::new() }
    }

    pub fn config(&self) -> &FuncConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FuncConfig) {
        self.config = config;
    }

    pub fn persistent_calls(&self) -> &PersistentCallGroup {
        &self.persistent_calls
    }

    pub fn add_listener(&mut self, delegate: Delegate<A, R>) {
        self.calls.add_runtime(Rc::new(InvokableCall::new(delegate)));
    }

    pub fn remove_listener(&mut self, delegate: &Delegate<A, R>) {
        self.remove_listener_for(delegate.target(), delegate.method_key());
    }

    pub fn remove_listener_for(&mut self, target: Option<EntityHandle>, method: &MethodKey) {
        self.calls.remove_runtime(target, method);
    }

    pub fn remove_all_listeners(&mut self) {
        self.calls.clear_runtime();
    }

    pub fn runtime_listener_count(&self) -> usize {
        self.calls.runtime_count()
    }

    pub fn persistent_listener_count(&self) -> usize {
        self.persistent_calls.count()
    }

    pub fn persistent_target(&self, index: usize) -> Option<EntityHandle> {
        self.persistent_calls.listener(index).and_then(PersistentCall::target)
    }

    pub fn persistent_method_name(&self, index: usize) -> Option<&str> {
        self.persistent_calls.listener(index).map(PersistentCall::method_name)
    }

    pub fn persistent_listener_state(&self, index: usize) -> Option<CallState> {
        self.persistent_calls.listener(index).map(PersistentCall::call_state)
    }

    pub fn set_persistent_listener_state(&mut self, index: usize, state: CallState) -> bool {
        let found = match self.persistent_calls.listener_mut(index) {
            Some(call) => {
                call.set_call_state(state);
                true
            }
            None => false,
        };
        self.dirty_persistent_calls();
        found
    }

    pub fn add_persistent_listener(&mut self, host: &dyn Host, delegate: &Delegate<A, R>) -> Result<usize, BindError> {
        self.add_persistent_listener_with_state(host, delegate, self.config.default_call_state)
    }

    pub fn add_persistent_listener_with_state(
        &mut self,
        host: &dyn Host,
        delegate: &Delegate<A, R>,
        state: CallState,
    ) -> Result<usize, BindError> {
        self.append_persistent(state, |func, index| func.register_persistent_listener(host, index, delegate))
    }

    pub fn register_persistent_listener(
        &mut self,
        host: &dyn Host,
        index: usize,
        delegate: &Delegate<A, R>,
    ) -> Result<(), BindError> {
        let target = self.validate_registration(host, index, delegate, &A::param_types())?;
        self.persistent_calls.register_event_listener(index, target, delegate.method_name());
        self.dirty_persistent_calls();
        Ok(())
    }

    /// Adds a persistent listener to a parameterless method; the func's arguments are dropped.
    pub fn add_void_persistent_listener(
        &mut self,
        host: &dyn Host,
        delegate: &Delegate<(), R>,
    ) -> Result<usize, BindError> {
        let state = self.config.default_call_state;
        self.append_persistent(state, |func, index| func.register_void_persistent_listener(host, index, delegate))
    }

    pub fn register_void_persistent_listener(
        &mut self,
        host: &dyn Host,
        index: usize,
        delegate: &Delegate<(), R>,
    ) -> Result<(), BindError> {
        let target = self.validate_registration(host, index, delegate, &[])?;
        self.persistent_calls.register_void_listener(index, target, delegate.method_name());
        self.dirty_persistent_calls();
        Ok(())
    }

    /// Adds a persistent listener that is always called with `argument` instead of the func's
    /// arguments.
    pub fn add_cached_persistent_listener<T: CachedArg>(
        &mut self,
        host: &dyn Host,
        delegate: &Delegate<(T,), R>,
        argument: T,
    ) -> Result<usize, BindError> {
        let state = self.config.default_call_state;
        self.append_persistent(state, move |func, index| {
            func.register_cached_persistent_listener(host, index, delegate, argument)
        })
    }

    pub fn register_cached_persistent_listener<T: CachedArg>(
        &mut self,
        host: &dyn Host,
        index: usize,
        delegate: &Delegate<(T,), R>,
        argument: T,
    ) -> Result<(), BindError> {
        let requested = [argument.requested_type(host)];
        let target = self.validate_registration(host, index, delegate, &requested)?;
        argument.store(&mut self.persistent_calls, host, index, target, delegate.method_name());
        self.dirty_persistent_calls();
        Ok(())
    }

    pub fn remove_persistent_listener(&mut self, index: usize) -> Option<PersistentCall> {
        let removed = self.persistent_calls.remove_listener(index);
        self.dirty_persistent_calls();
        removed
    }

    pub fn remove_persistent_listeners<P: Signature>(&mut self, delegate: &Delegate<P, R>) -> usize {
        let Some(target) = delegate.target() else {
            return 0;
        };
        if delegate.is_static() || delegate.method_key().is_anonymous() {
            return 0;
        }
        let removed = self.persistent_calls.remove_listeners(target, delegate.method_name());
        self.dirty_persistent_calls();
        removed
    }

    /// Clears the target and method of a persistent listener but keeps its slot.
    pub fn unregister_persistent_listener(&mut self, index: usize) -> bool {
        let found = self.persistent_calls.unregister_listener(index);
        self.dirty_persistent_calls();
        found
    }

    pub fn find_method(&self, host: &dyn Host, index: usize) -> Result<Rc<MethodDescriptor>, BindError> {
        let count = self.persistent_calls.count();
        let call = self.persistent_calls.listener(index).ok_or(BindError::IndexOutOfRange { index, count })?;
        call.find_method::<A>(host)
    }

    /// Rebuilds the call list if needed and returns the calls an invoke would run, in order.
    pub fn prepare_invoke(&mut self, cx: &InvokeContext<'_>) -> &[CallRef<R>] {
        self.rebuild_persistent_calls_if_needed(cx);
        self.calls.prepare_invoke()
    }

    pub fn invoke_dynamic(&mut self, cx: &InvokeContext<'_>, args: &[Value]) -> Result<R, InvokeError> {
        if args.len() != A::ARITY {
            return Err(InvokeError::ArgumentCount { expected: A::ARITY, actual: args.len() });
        }
        self.invoke_values(cx, args)
    }

    fn invoke_values(&mut self, cx: &InvokeContext<'_>, args: &[Value]) -> Result<R, InvokeError> {
        let mut result = None;
        for call in self.prepare_invoke(cx) {
            let arity = call.arity().min(args.len());
            if let Some(value) = call.invoke(cx.host, &args[..arity])? {
                result = Some(value);
            }
        }
        Ok(result.unwrap_or_default())
    }

    fn append_persistent(
        &mut self,
        state: CallState,
        register: impl FnOnce(&mut Self, usize) -> Result<(), BindError>,
    ) -> Result<usize, BindError> {
        let index = self.persistent_calls.add_listener();
        match register(self, index) {
            Ok(()) => {
                self.set_persistent_listener_state(index, state);
                Ok(index)
            }
            Err(err) => {
                self.persistent_calls.remove_listener(index);
                Err(err)
            }
        }
    }

    fn validate_registration<P: Signature>(
        &self,
        host: &dyn Host,
        index: usize,
        delegate: &Delegate<P, R>,
        requested: &[ValueType],
    ) -> Result<EntityHandle, BindError> {
        let result = self.check_registration(host, index, delegate, requested);
        if let Err(err) = &result {
            log::warn!("[func] could not register listener '{}': {err}", delegate.method_name());
        }
        result
    }

    fn check_registration<P: Signature>(
        &self,
        host: &dyn Host,
        index: usize,
        delegate: &Delegate<P, R>,
        requested: &[ValueType],
    ) -> Result<EntityHandle, BindError> {
        let count = self.persistent_calls.count();
        if index >= count {
            return Err(BindError::IndexOutOfRange { index, count });
        }
        if delegate.is_static() {
            return Err(BindError::StaticMethod(delegate.method_name().to_string()));
        }
        if delegate.method_key().is_anonymous() {
            return Err(BindError::Anonymous);
        }
        let target = delegate.target().ok_or(BindError::MissingTarget)?;
        let ty = host.type_of(target).ok_or(BindError::DeadTarget(target))?;
        let method = find_valid_method(&ty, delegate.method_name(), requested, host).ok_or_else(|| {
            BindError::MethodNotFound { type_name: ty.name().to_string(), method: delegate.method_name().to_string() }
        })?;
        check_binding::<R>(&method, requested)?;
        Ok(target)
    }

    fn dirty_persistent_calls(&mut self) {
        self.calls.clear_persistent();
        self.calls_dirty = true;
    }

    fn rebuild_persistent_calls_if_needed(&mut self, cx: &InvokeContext<'_>) {
        if !self.calls_dirty && self.built_for == Some(cx.execution) {
            return;
        }
        self.calls.clear_persistent();
        let summary = self.persistent_calls.initialize::<A, R>(&mut self.calls, cx, self.config.warn_unresolved);
        log::debug!(
            "[func] rebuilt persistent calls: {} resolved, {} skipped, {} unresolved",
            summary.resolved,
            summary.skipped,
            summary.unresolved
        );
        self.calls_dirty = false;
        self.built_for = Some(cx.execution);
    }
}

macro_rules! impl_func_arity {
    ($alias:ident; $($T:ident $arg:ident),*) => {
        pub type $alias<$($T,)* R> = Func<($($T,)*), R>;

        impl<$($T: Arg,)* R: Arg + Default> Func<($($T,)*), R> {
            pub fn invoke(&mut self, cx: &InvokeContext<'_>, $($arg: $T),*) -> Result<R, InvokeError> {
                let args = ($($arg,)*).into_values();
                self.invoke_values(cx, &args)
            }

            pub fn listen(&mut self, f: impl Fn($($T),*) -> R + 'static) -> Delegate<($($T,)*), R> {
                let delegate = Delegate::new(f);
                self.add_listener(delegate.clone());
                delegate
            }
        }
    };
}

impl_func_arity!(Func0;);
impl_func_arity!(Func1; T0 arg0);
impl_func_arity!(Func2; T0 arg0, T1 arg1);
impl_func_arity!(Func3; T0 arg0, T1 arg1, T2 arg2);
impl_func_arity!(Func4; T0 arg0, T1 arg1, T2 arg2, T3 arg3);

impl<A, R> fmt::Debug for Func<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func")
            .field("persistent_calls", &self.persistent_calls.count())
            .field("runtime_calls", &self.calls.runtime_count())
            .field("dirty", &self.calls_dirty)
            .finish()
    }
}

impl<A, R> Serialize for Func<A, R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.persistent_calls.serialize(serializer)
    }
}

impl<'de, A: Signature, R: Arg + Default> Deserialize<'de> for Func<A, R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PersistentCallGroup::deserialize(deserializer).map(Self::from_persistent_calls)
    }
}
