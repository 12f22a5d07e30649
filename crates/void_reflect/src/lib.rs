//! # void_reflect - Runtime Reflection & Dynamic Invocation
//!
//! Describes native functions, types and event buses so that generic code
//! (script bindings, editors, network layers) can discover and call them by
//! name with type-erased arguments.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ Native closures │────▶│  Method         │ ◀── typed trampolines
//! │ fn / &C / &mut C│     │  (signature)    │     (IntoFunction/IntoMethod)
//! └─────────────────┘     └────────┬────────┘
//!                                  │
//!          ┌───────────────────────┼───────────────────────┐
//!          ▼                       ▼                       ▼
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │    Property     │     │      Class      │     │  EventBusDesc   │
//! │ (getter/setter) │     │  (lifecycle)    │     │ (senders, hooks)│
//! └────────┬────────┘     └────────┬────────┘     └────────┬────────┘
//!          │                       │                       │
//!          └───────────────────────┼───────────────────────┘
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │ ContextRegistry │────▶ ContextEvents observers
//!                         └─────────────────┘
//! ```
//!
//! Calls go through [`ValueSlot`]s: borrowed or owned, type-tagged values
//! that convert themselves to the declared parameter type (derived to base,
//! enum to underlying integer) before the native code runs.
//!
//! ## Example
//!
//! ```ignore
//! use void_reflect::prelude::*;
//!
//! let mut registry = ContextRegistry::new();
//! registry.register_method(
//!     Method::from_fn("add", |a: i32, b: i32| a + b)
//!         .with_argument_names(&["a", "b"])
//!         .with_default(1, 10)?,
//! )?;
//!
//! let mut a = 5;
//! let mut result = ValueSlot::result_of::<i32>();
//! registry.call("add", &mut [ValueSlot::new(&mut a)], Some(&mut result));
//! assert_eq!(result.take::<i32>(), Some(15));
//! ```

mod attribute;
mod class;
mod config;
mod context;
mod ebus;
mod error;
mod handler;
mod method;
mod parameter;
mod property;
mod signature;
mod slot;

pub use attribute::{keys, AttributeMap};
pub use class::{Class, ClassBuilder, Lifecycle, Object, ScopedObject};
pub use config::{ReflectConfig, DEFAULT_MAX_PARAMETERS};
pub use context::{ContextEvents, ContextObservers, ContextRegistry};
pub use ebus::{
    Dispatch, EventBusBuilder, EventBusDesc, EventInvoker, EventSender, IntoEvent, VirtualProperty,
};
pub use error::{ReflectError, Result};
pub use handler::{
    BusHandler, BusHandlerAdapter, EventKey, GenericHook, HandlerBinder, HandlerBinderBuilder,
    HandlerEvent, HookContext, UserData,
};
pub use method::{Method, Overloads};
pub use parameter::{DefaultValue, ParamInfo, ParamMetadata, ParamTraits};
pub use property::{Property, PropertyOwner};
pub use signature::{
    ArgList, FnInvoker, HookFn, IntoFunction, IntoMethod, Invoke, RawInvoker, Signature, SlotArray,
    INLINE_ARGS,
};
pub use slot::{AssignedCallback, ValueSlot, SCRATCH_SIZE};

pub use void_core::{base_type, BaseType, Reflect, TypeInfo, Underlying};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::attribute::{keys, AttributeMap};
    pub use crate::class::{Class, Object};
    pub use crate::context::{ContextEvents, ContextObservers, ContextRegistry};
    pub use crate::ebus::EventBusDesc;
    pub use crate::error::{ReflectError, Result};
    pub use crate::handler::{BusHandler, HandlerBinder, HookContext};
    pub use crate::method::Method;
    pub use crate::parameter::{ParamInfo, ParamMetadata};
    pub use crate::property::Property;
    pub use crate::slot::ValueSlot;
    pub use void_core::{base_type, Reflect};
}
