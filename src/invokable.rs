use crate::error::{BindError, InvokeError};
use crate::host::{EntityHandle, Host};
use crate::reflect::{Arg, MethodDescriptor, MethodKey, Signature, Value, ValueType};
use std::fmt;
use std::rc::Rc;

pub trait Handler<A, R>: 'static {
    fn into_fn(self) -> Rc<dyn Fn(A) -> R>;
}

macro_rules! impl_handler {
    ($($T:ident $arg:ident),*) => {
        impl<F, R, $($T,)*> Handler<($($T,)*), R> for F
        where
            F: Fn($($T),*) -> R + 'static,
            R: 'static,
            $($T: 'static,)*
        {
            fn into_fn(self) -> Rc<dyn Fn(($($T,)*)) -> R> {
                Rc::new(move |($($arg,)*)| (self)($($arg),*))
            }
        }
    };
}

impl_handler!();
impl_handler!(T0 a0);
impl_handler!(T0 a0, T1 a1);
impl_handler!(T0 a0, T1 a1, T2 a2);
impl_handler!(T0 a0, T1 a1, T2 a2, T3 a3);

enum Body<A, R> {
    Method(Rc<MethodDescriptor>),
    Native(Rc<dyn Fn(A) -> R>),
}

impl<A, R> Clone for Body<A, R> {
    fn clone(&self) -> Self {
        match self {
            Body::Method(method) => Body::Method(Rc::clone(method)),
            Body::Native(f) => Body::Native(Rc::clone(f)),
        }
    }
}

pub struct Delegate<A, R> {
    target: Option<EntityHandle>,
    method: MethodKey,
    body: Body<A, R>,
}

impl<A, R> Clone for Delegate<A, R> {
    fn clone(&self) -> Self {
        Self { target: self.target, method: self.method.clone(), body: self.body.clone() }
    }
}

impl<A: Signature, R: Arg> Delegate<A, R> {
    /// A free closure. It has no target, so it is never suppressed. Clones of the returned
    /// delegate share its identity.
    pub fn new(f: impl Handler<A, R>) -> Self {
        Self { target: None, method: MethodKey::anonymous(A::param_types()), body: Body::Native(f.into_fn()) }
    }

    /// A closure acting as method `method` of `target`: skipped once the target is destroyed and
    /// matched by `(target, method)` for removal and persistence.
    pub fn bound(target: EntityHandle, method: impl Into<String>, f: impl Handler<A, R>) -> Self {
        Self {
            target: Some(target),
            method: MethodKey::named(method, A::param_types()),
            body: Body::Native(f.into_fn()),
        }
    }

    pub fn method(target: Option<EntityHandle>, method: Rc<MethodDescriptor>) -> Result<Self, BindError> {
        let target = if method.is_static() { None } else { Some(target.ok_or(BindError::MissingTarget)?) };
        check_binding::<R>(&method, &A::param_types())?;
        Ok(Self { target, method: method.key(), body: Body::Method(method) })
    }

    pub fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    pub fn method_key(&self) -> &MethodKey {
        &self.method
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn is_static(&self) -> bool {
        matches!(&self.body, Body::Method(method) if method.is_static())
    }
}

impl<A, R> fmt::Debug for Delegate<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.body {
            Body::Method(_) => "method",
            Body::Native(_) => "closure",
        };
        f.debug_struct("Delegate")
            .field("target", &self.target)
            .field("method", &self.method.name())
            .field("kind", &kind)
            .finish()
    }
}

pub(crate) fn check_binding<R: Arg>(method: &MethodDescriptor, requested: &[ValueType]) -> Result<(), BindError> {
    if method.params().len() != requested.len() {
        return Err(BindError::Arity {
            method: method.name().to_string(),
            expected: requested.len(),
            actual: method.params().len(),
        });
    }
    for (index, (declared, requested)) in method.params().iter().zip(requested).enumerate() {
        let binds = match (declared, requested) {
            (ValueType::Entity(_), ValueType::Entity(_)) => true,
            (ValueType::Any, requested) => !requested.is_primitive() && *requested != ValueType::Unit,
            (declared, requested) => declared == requested,
        };
        if !binds {
            return Err(BindError::Parameter {
                method: method.name().to_string(),
                index,
                declared: declared.clone(),
                requested: requested.clone(),
            });
        }
    }
    let expected = R::value_type();
    let returns = match (&expected, method.returns()) {
        (ValueType::Any, _) => true,
        (ValueType::Entity(_), ValueType::Entity(_)) => true,
        (expected, declared) => expected == declared,
    };
    if !returns {
        return Err(BindError::ReturnType {
            method: method.name().to_string(),
            declared: method.returns().clone(),
            expected,
        });
    }
    Ok(())
}

pub trait Invocable<R> {
    fn arity(&self) -> usize;

    /// Checked invocation. `Ok(None)` means the call was suppressed because its target is gone.
    fn invoke(&self, host: &dyn Host, args: &[Value]) -> Result<Option<R>, InvokeError>;

    fn matches(&self, target: Option<EntityHandle>, method: &MethodKey) -> bool;
}

pub struct InvokableCall<A, R> {
    delegate: Delegate<A, R>,
    params: Vec<ValueType>,
}

impl<A: Signature, R: Arg> InvokableCall<A, R> {
    pub fn new(delegate: Delegate<A, R>) -> Self {
        let params = match &delegate.body {
            Body::Method(method) => method.params().to_vec(),
            Body::Native(_) => A::param_types(),
        };
        Self { delegate, params }
    }

    pub fn from_method(target: EntityHandle, method: Rc<MethodDescriptor>) -> Result<Self, BindError> {
        Delegate::method(Some(target), method).map(Self::new)
    }

    pub fn delegate(&self) -> &Delegate<A, R> {
        &self.delegate
    }

    fn allow_invoke(&self, host: &dyn Host) -> bool {
        self.delegate.target.map_or(true, |target| host.is_alive(target))
    }

    fn dispatch(&self, host: &dyn Host, args: &[Value]) -> Result<Option<R>, InvokeError> {
        if !self.allow_invoke(host) {
            return Ok(None);
        }
        match &self.delegate.body {
            Body::Method(method) => {
                let out = method.call(self.delegate.target, args);
                let actual = out.value_type();
                R::from_value(out).map(Some).ok_or_else(|| InvokeError::ReturnType {
                    method: method.name().to_string(),
                    expected: R::value_type(),
                    actual,
                })
            }
            Body::Native(f) => {
                let typed = A::from_values(args)
                    .ok_or(InvokeError::ArgumentCount { expected: A::ARITY, actual: args.len() })?;
                Ok(Some(f(typed)))
            }
        }
    }
}

impl<A: Signature, R: Arg> Invocable<R> for InvokableCall<A, R> {
    fn arity(&self) -> usize {
        A::ARITY
    }

    fn invoke(&self, host: &dyn Host, args: &[Value]) -> Result<Option<R>, InvokeError> {
        if args.len() != A::ARITY {
            return Err(InvokeError::ArgumentCount { expected: A::ARITY, actual: args.len() });
        }
        for (index, (arg, declared)) in args.iter().zip(&self.params).enumerate() {
            if !arg.is_assignable_to(declared, host) {
                return Err(InvokeError::ArgumentType {
                    index,
                    expected: declared.clone(),
                    actual: arg.value_type(),
                });
            }
        }
        self.dispatch(host, args)
    }

    fn matches(&self, target: Option<EntityHandle>, method: &MethodKey) -> bool {
        self.delegate.target == target && self.delegate.method == *method
    }
}

pub struct CachedInvokableCall<T, R> {
    call: InvokableCall<(T,), R>,
    argument: Value,
}

impl<T: Arg, R: Arg> CachedInvokableCall<T, R> {
    pub fn new(delegate: Delegate<(T,), R>, argument: T) -> Self {
        Self { call: InvokableCall::new(delegate), argument: argument.into_value() }
    }

    pub fn from_method(target: EntityHandle, method: Rc<MethodDescriptor>, argument: T) -> Result<Self, BindError> {
        Delegate::method(Some(target), method).map(|delegate| Self::new(delegate, argument))
    }
}

impl<T: Arg, R: Arg> Invocable<R> for CachedInvokableCall<T, R> {
    fn arity(&self) -> usize {
        1
    }

    fn invoke(&self, host: &dyn Host, _args: &[Value]) -> Result<Option<R>, InvokeError> {
        self.call.dispatch(host, std::slice::from_ref(&self.argument))
    }

    fn matches(&self, target: Option<EntityHandle>, method: &MethodKey) -> bool {
        self.call.matches(target, method)
    }
}
