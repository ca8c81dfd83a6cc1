pub mod argument_cache;
pub mod call_list;
pub mod config;
pub mod error;
pub mod func;
pub mod host;
pub mod invokable;
pub mod persistent;
pub mod persistent_group;
pub mod reflect;
pub mod world;

pub use argument_cache::{canonical_type_name, ArgumentCache};
pub use config::FuncConfig;
pub use error::{BindError, InvokeError};
pub use func::{CachedArg, Func, Func0, Func1, Func2, Func3, Func4};
pub use host::{EntityHandle, ExecutionContext, Host, InvokeContext};
pub use invokable::{CachedInvokableCall, Delegate, Handler, Invocable, InvokableCall};
pub use persistent::{CallState, PersistentCall, PersistentListenerMode};
pub use persistent_group::{PersistentCallGroup, ResolveSummary};
pub use reflect::{
    find_valid_method, Arg, MethodDescriptor, MethodKey, Signature, TypeBuilder, TypeInfo, Value, ValueType,
    ENTITY_TYPE_NAME,
};
pub use world::World;
