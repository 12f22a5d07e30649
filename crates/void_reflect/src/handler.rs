//! Handler adapters
//!
//! The reverse binding: generic code installs hooks on the events of a
//! [`HandlerBinder`], and a native forwarder object connected to a bus calls
//! [`HandlerBinder::call`] when an event fires.
//!
//! ```ignore
//! struct TickForwarder(Arc<HandlerBinder>);
//!
//! impl TickNotifications for TickForwarder {
//!     fn on_tick(&mut self, dt: f32) {
//!         self.0.call(0, (dt,));
//!     }
//! }
//!
//! let binder = HandlerBinder::builder().event::<(f32,), ()>("OnTick").build();
//! binder.install_hook("OnTick", |dt: f32| log::info!("tick {}", dt))?;
//! ```

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use void_core::Reflect;
use void_event::{BusAddress, BusError, EventBus, HandlerId, Priority, SharedHandler};

use crate::error::{ReflectError, Result};
use crate::parameter::{ParamInfo, ParamMetadata};
use crate::signature::{ArgList, HookFn};
use crate::slot::ValueSlot;

/// Opaque data handed back to a generic hook
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Identity of the event a generic hook is running for
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    pub user_data: Option<&'a (dyn Any + Send + Sync)>,
    pub event_name: &'a str,
    pub event_index: usize,
}

impl fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("event_name", &self.event_name)
            .field("event_index", &self.event_index)
            .field("user_data", &self.user_data.is_some())
            .finish()
    }
}

/// Hook receiving the raw argument slots; the result slot is present when
/// the event returns a value
pub type GenericHook =
    Arc<dyn Fn(&HookContext<'_>, &mut [ValueSlot<'_>], Option<&mut ValueSlot<'_>>) + Send + Sync>;

struct TypedHook<Args, R>(Box<dyn HookFn<Args, R>>);

#[derive(Clone)]
enum Hook {
    /// Holds a `TypedHook<Args, R>`
    Typed(Arc<dyn Any + Send + Sync>),
    Generic {
        hook: GenericHook,
        user_data: Option<UserData>,
    },
}

/// One entry of the event table
pub struct HandlerEvent {
    name: String,
    /// Result first, then the arguments
    params: Vec<ParamInfo>,
    metadata: Vec<ParamMetadata>,
    hook: RwLock<Option<Hook>>,
}

impl HandlerEvent {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn result(&self) -> &ParamInfo {
        &self.params[0]
    }

    pub fn arguments(&self) -> &[ParamInfo] {
        &self.params[1..]
    }

    pub fn argument_name(&self, index: usize) -> Option<&str> {
        self.metadata.get(index)?.name.as_deref()
    }

    pub fn has_hook(&self) -> bool {
        self.hook.read().is_some()
    }

    pub fn is_hook_generic(&self) -> bool {
        matches!(*self.hook.read(), Some(Hook::Generic { .. }))
    }
}

impl fmt::Debug for HandlerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEvent")
            .field("name", &self.name)
            .field("result", self.result())
            .field("arguments", &self.arguments())
            .field("hooked", &self.has_hook())
            .finish()
    }
}

/// Selects an event by index or by name
pub trait EventKey: fmt::Display {
    fn resolve(&self, binder: &HandlerBinder) -> Option<usize>;
}

impl EventKey for usize {
    fn resolve(&self, binder: &HandlerBinder) -> Option<usize> {
        (*self < binder.events.len()).then_some(*self)
    }
}

impl EventKey for &str {
    fn resolve(&self, binder: &HandlerBinder) -> Option<usize> {
        binder.function_index(self)
    }
}

/// Ordered table of handler events and their installed hooks
#[derive(Debug, Default)]
pub struct HandlerBinder {
    events: Vec<HandlerEvent>,
}

/// Registers `(name, signature)` entries in order
#[derive(Default)]
pub struct HandlerBinderBuilder {
    events: Vec<HandlerEvent>,
}

impl HandlerBinderBuilder {
    /// Add an event taking `Args` and returning `R`
    pub fn event<Args: ArgList, R: Reflect>(self, name: &str) -> Self {
        self.event_with::<Args, R>(name, &[])
    }

    /// Add an event with argument names
    pub fn event_with<Args: ArgList, R: Reflect>(mut self, name: &str, arg_names: &[&str]) -> Self {
        let mut params = Vec::with_capacity(Args::COUNT + 1);
        params.push(ParamInfo::of::<R>());
        params.extend(Args::params());
        let metadata = (0..Args::COUNT)
            .map(|i| match arg_names.get(i) {
                Some(name) => ParamMetadata::named(*name),
                None => ParamMetadata::default(),
            })
            .collect();
        self.events.push(HandlerEvent {
            name: name.to_string(),
            params,
            metadata,
            hook: RwLock::new(None),
        });
        self
    }

    pub fn build(self) -> HandlerBinder {
        HandlerBinder {
            events: self.events,
        }
    }
}

impl HandlerBinder {
    pub fn builder() -> HandlerBinderBuilder {
        HandlerBinderBuilder::default()
    }

    pub fn events(&self) -> &[HandlerEvent] {
        &self.events
    }

    pub fn event(&self, index: usize) -> Option<&HandlerEvent> {
        self.events.get(index)
    }

    /// Index of the event called `name`
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e.name == name)
    }

    /// Check the table is usable by a handler factory: at least one event,
    /// no duplicate names
    pub fn validate(&self, owner: &str) -> Result<()> {
        if self.events.is_empty() {
            return Err(ReflectError::signature(owner, "handler declares no events"));
        }
        let mut seen = HashSet::new();
        for event in &self.events {
            if !seen.insert(event.name.as_str()) {
                return Err(ReflectError::signature(
                    owner,
                    format!("handler event '{}' is declared twice", event.name),
                ));
            }
        }
        Ok(())
    }

    fn lookup(&self, key: impl EventKey) -> Result<(usize, &HandlerEvent)> {
        let index = key
            .resolve(self)
            .ok_or_else(|| ReflectError::not_found("handler event", key.to_string()))?;
        Ok((index, &self.events[index]))
    }

    /// Install a typed hook. Its argument tuple and result must match the
    /// event exactly.
    pub fn install_hook<Args, R, H>(&self, key: impl EventKey, hook: H) -> Result<()>
    where
        Args: ArgList,
        R: Reflect,
        H: HookFn<Args, R>,
    {
        let (_, event) = self.lookup(key)?;
        let expected = event.arguments();
        if Args::COUNT != expected.len() {
            return Err(ReflectError::signature(
                &event.name,
                format!("hook takes {} argument(s), event has {}", Args::COUNT, expected.len()),
            ));
        }
        let offered = Args::params();
        if let Some(position) = offered
            .iter()
            .zip(expected)
            .position(|(offered, expected)| !offered.same_type(expected))
        {
            return Err(ReflectError::signature(
                &event.name,
                format!(
                    "hook argument {} is {}, event passes {}",
                    position,
                    offered[position].name(),
                    expected[position].name()
                ),
            ));
        }
        if TypeId::of::<R>() != event.result().type_id().unwrap_or(TypeId::of::<()>()) {
            return Err(ReflectError::signature(
                &event.name,
                format!("hook returns {}, event returns {}", R::type_name(), event.result().name()),
            ));
        }

        let typed: Arc<dyn Any + Send + Sync> = Arc::new(TypedHook::<Args, R>(Box::new(hook)));
        *event.hook.write() = Some(Hook::Typed(typed));
        log::debug!("Installed typed hook on '{}'", event.name);
        Ok(())
    }

    /// Install a hook that receives raw slots instead of typed arguments
    pub fn install_generic_hook<H>(
        &self,
        key: impl EventKey,
        hook: H,
        user_data: Option<UserData>,
    ) -> Result<()>
    where
        H: Fn(&HookContext<'_>, &mut [ValueSlot<'_>], Option<&mut ValueSlot<'_>>) + Send + Sync + 'static,
    {
        let (_, event) = self.lookup(key)?;
        *event.hook.write() = Some(Hook::Generic {
            hook: Arc::new(hook),
            user_data,
        });
        log::debug!("Installed generic hook on '{}'", event.name);
        Ok(())
    }

    /// Remove the hook of one event. Returns whether a hook was installed.
    pub fn remove_hook(&self, key: impl EventKey) -> bool {
        match key.resolve(self) {
            Some(index) => self.events[index].hook.write().take().is_some(),
            None => false,
        }
    }

    /// Fire a void event
    pub fn call<Args: ArgList>(&self, index: usize, args: Args) {
        self.call_result::<Args, ()>(index, args);
    }

    /// Fire an event and return the hook's result. `None` when no hook is
    /// installed, the hook produced nothing, or the call failed.
    pub fn call_result<Args: ArgList, R: Reflect>(&self, index: usize, args: Args) -> Option<R> {
        match self.try_call_result(index, args) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("{}", err);
                None
            }
        }
    }

    /// Fire a void event, reporting a hook that does not take `Args`
    pub fn try_call<Args: ArgList>(&self, index: usize, args: Args) -> Result<()> {
        self.try_call_result::<Args, ()>(index, args).map(|_| ())
    }

    /// Fire an event. A typed hook installed with other argument or result
    /// types is a `SignatureMismatch`; an unknown index is `NotFound`.
    pub fn try_call_result<Args: ArgList, R: Reflect>(
        &self,
        index: usize,
        mut args: Args,
    ) -> Result<Option<R>> {
        let event = self
            .events
            .get(index)
            .ok_or_else(|| ReflectError::not_found("handler event", format!("#{}", index)))?;
        // The hook runs outside the lock so it may reinstall itself
        let Some(hook) = event.hook.read().clone() else {
            return Ok(None);
        };
        match hook {
            Hook::Typed(typed) => match typed.downcast_ref::<TypedHook<Args, R>>() {
                Some(typed) => Ok(Some(typed.0.call(args))),
                None => Err(ReflectError::signature(
                    event.name.as_str(),
                    "hook was installed with other argument or result types",
                )),
            },
            Hook::Generic { hook, user_data } => {
                let context = HookContext {
                    user_data: user_data.as_deref(),
                    event_name: &event.name,
                    event_index: index,
                };
                let mut slots = args.bind_slots();
                if TypeId::of::<R>() == TypeId::of::<()>() {
                    hook(&context, &mut slots[..], None);
                    return Ok(None);
                }
                let mut result = ValueSlot::result_of::<R>();
                hook(&context, &mut slots[..], Some(&mut result));
                Ok(result.take::<R>())
            }
        }
    }
}

/// A connectable handler created by a bus handler factory
pub trait BusHandler: Send {
    /// Event table to install hooks on
    fn binder(&self) -> &HandlerBinder;

    fn bus_name(&self) -> &str;

    /// Connect to the bus. Addressed buses require an address convertible
    /// to the bus address type; single buses ignore it.
    fn connect(&mut self, address: Option<&mut ValueSlot<'_>>) -> Result<()>;

    /// Disconnect from `address`, or from everything when `None`
    fn disconnect(&mut self, address: Option<&mut ValueSlot<'_>>);

    fn is_connected(&self) -> bool;

    fn is_connected_to(&self, address: &mut ValueSlot<'_>) -> bool;
}

/// Connects a native forwarder of interface `I` to an [`EventBus`]
pub struct BusHandlerAdapter<I, A>
where
    I: ?Sized + Send + 'static,
    A: BusAddress + Reflect,
{
    bus: Arc<EventBus<I, A>>,
    binder: Arc<HandlerBinder>,
    forwarder: SharedHandler<I>,
    priority: Priority,
    connections: Vec<(HandlerId, Option<A>)>,
}

impl<I, A> BusHandlerAdapter<I, A>
where
    I: ?Sized + Send + 'static,
    A: BusAddress + Reflect,
{
    pub fn new(bus: Arc<EventBus<I, A>>, binder: Arc<HandlerBinder>, forwarder: SharedHandler<I>) -> Self {
        Self {
            bus,
            binder,
            forwarder,
            priority: Priority::Normal,
            connections: Vec::new(),
        }
    }

    /// Priority used by later connects
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn binder_arc(&self) -> &Arc<HandlerBinder> {
        &self.binder
    }

    fn read_address(&self, slot: &mut ValueSlot<'_>) -> Result<A> {
        let mut slot = slot.reborrow();
        let found = slot.param().to_string();
        if !slot.convert_to(TypeId::of::<A>()) {
            return Err(ReflectError::TypeConversionFailure {
                method: format!("{}::Connect", self.bus.name()),
                position: "address".into(),
                expected: A::type_name().into(),
                found,
            });
        }
        // SAFETY: converted to `A` above
        Ok(unsafe { slot.get_unchecked::<A>() }.clone())
    }

    fn disconnect_all(&mut self) {
        for (id, _) in self.connections.drain(..) {
            if !self.bus.disconnect(id) {
                log::warn!("bus '{}': handler {:?} was already disconnected", self.bus.name(), id);
            }
        }
    }
}

impl<I, A> BusHandler for BusHandlerAdapter<I, A>
where
    I: ?Sized + Send + 'static,
    A: BusAddress + Reflect,
{
    fn binder(&self) -> &HandlerBinder {
        &self.binder
    }

    fn bus_name(&self) -> &str {
        self.bus.name()
    }

    fn connect(&mut self, address: Option<&mut ValueSlot<'_>>) -> Result<()> {
        if self.bus.policy().is_addressed() {
            let slot = address.ok_or_else(|| BusError::AddressRequired(self.bus.name().to_string()))?;
            let address = self.read_address(slot)?;
            if self.connections.iter().any(|(_, a)| a.as_ref() == Some(&address)) {
                return Ok(());
            }
            let id = self.bus.connect_to_with_priority(
                address.clone(),
                Arc::clone(&self.forwarder),
                self.priority,
            )?;
            self.connections.push((id, Some(address)));
        } else if self.connections.is_empty() {
            let id = self
                .bus
                .connect_with_priority(Arc::clone(&self.forwarder), self.priority)?;
            self.connections.push((id, None));
        }
        Ok(())
    }

    fn disconnect(&mut self, address: Option<&mut ValueSlot<'_>>) {
        let address = match address {
            Some(slot) if self.bus.policy().is_addressed() => match self.read_address(slot) {
                Ok(address) => address,
                Err(err) => {
                    log::warn!("{}", err);
                    return;
                }
            },
            _ => return self.disconnect_all(),
        };
        let bus = &self.bus;
        self.connections.retain(|(id, connected)| {
            if connected.as_ref() == Some(&address) {
                bus.disconnect(*id);
                false
            } else {
                true
            }
        });
    }

    fn is_connected(&self) -> bool {
        self.connections.iter().any(|(id, _)| self.bus.is_connected(*id))
    }

    fn is_connected_to(&self, address: &mut ValueSlot<'_>) -> bool {
        if !self.bus.policy().is_addressed() {
            return self.is_connected();
        }
        match self.read_address(address) {
            Ok(address) => self
                .connections
                .iter()
                .any(|(id, _)| self.bus.is_connected_to(*id, &address)),
            Err(_) => false,
        }
    }
}

impl<I, A> Drop for BusHandlerAdapter<I, A>
where
    I: ?Sized + Send + 'static,
    A: BusAddress + Reflect,
{
    fn drop(&mut self) {
        self.disconnect_all();
    }
}
