//! Event bus descriptors
//!
//! An [`EventBusDesc`] reflects one native [`EventBus`]. Every reflected
//! event becomes an [`EventSender`] holding up to four dispatchers, chosen by
//! the bus policy:
//!
//! | Variant | Exists when | Arguments | Result |
//! |---|---|---|---|
//! | broadcast | always | event arguments | event result |
//! | event | addressed | address, event arguments | event result |
//! | queue_broadcast | queued | event arguments | void |
//! | queue_event | addressed and queued | address, event arguments | void |

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use void_core::Reflect;
use void_event::{BusAddress, BusError, BusPolicy, EventBus, SharedHandler};

use crate::attribute::AttributeMap;
use crate::error::{ReflectError, Result};
use crate::handler::{BusHandler, BusHandlerAdapter, HandlerBinder};
use crate::method::Method;
use crate::parameter::ParamInfo;
use crate::signature::{next_arg, store_return, Invoke, Signature};
use crate::slot::ValueSlot;

/// Dispatch variant of an event sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dispatch {
    Broadcast,
    Event,
    QueueBroadcast,
    QueueEvent,
}

impl Dispatch {
    pub fn is_addressed(self) -> bool {
        matches!(self, Self::Event | Self::QueueEvent)
    }

    pub fn is_queued(self) -> bool {
        matches!(self, Self::QueueBroadcast | Self::QueueEvent)
    }
}

/// A closure calling one method of the bus interface `I`
pub trait IntoEvent<I: ?Sized, Marker>: Clone + Send + Sync + 'static {
    /// Result first, then the event arguments
    fn params() -> Vec<ParamInfo>;

    fn dispatcher<A: BusAddress + Reflect>(self, bus: Arc<EventBus<I, A>>, kind: Dispatch) -> Box<dyn Invoke>;
}

/// Erased dispatcher for one event variant
pub struct EventInvoker<I: ?Sized, A, F, M> {
    func: F,
    bus: Arc<EventBus<I, A>>,
    kind: Dispatch,
    _marker: PhantomData<fn() -> M>,
}

macro_rules! impl_into_event {
    ($($arg:ident $var:ident),*) => {
        impl<I, F, R, $($arg,)*> IntoEvent<I, fn($($arg),*) -> R> for F
        where
            I: ?Sized + Send + 'static,
            F: Fn(&mut I, $($arg),*) -> R + Clone + Send + Sync + 'static,
            R: Reflect,
            $($arg: Reflect + Clone,)*
        {
            fn params() -> Vec<ParamInfo> {
                vec![ParamInfo::of::<R>(), $(ParamInfo::of::<$arg>()),*]
            }

            fn dispatcher<A: BusAddress + Reflect>(self, bus: Arc<EventBus<I, A>>, kind: Dispatch) -> Box<dyn Invoke> {
                Box::new(EventInvoker::<I, A, F, fn($($arg),*) -> R> {
                    func: self,
                    bus,
                    kind,
                    _marker: PhantomData,
                })
            }
        }

        impl<I, A, F, R, $($arg,)*> Invoke for EventInvoker<I, A, F, fn($($arg),*) -> R>
        where
            I: ?Sized + Send + 'static,
            A: BusAddress + Reflect,
            F: Fn(&mut I, $($arg),*) -> R + Clone + Send + Sync + 'static,
            R: Reflect,
            $($arg: Reflect + Clone,)*
        {
            #[allow(unused_mut, unused_variables)]
            unsafe fn invoke(
                &self,
                args: &mut [ValueSlot<'_>],
                result: Option<&mut ValueSlot<'_>>,
            ) -> Result<()> {
                let mut slots = args.iter();
                let address = if self.kind.is_addressed() {
                    Some(next_arg::<A>(&mut slots)?)
                } else {
                    None
                };
                $(let $var = next_arg::<$arg>(&mut slots)?;)*
                let func = &self.func;
                match (self.kind, address) {
                    (Dispatch::Broadcast, _) => {
                        if let Some(value) = self.bus.broadcast_result(|h| func(h, $($var.clone()),*)) {
                            store_return(result, value)?;
                        }
                    }
                    (Dispatch::Event, Some(address)) => {
                        if let Some(value) = self.bus.event_result(&address, |h| func(h, $($var.clone()),*))? {
                            store_return(result, value)?;
                        }
                    }
                    (Dispatch::QueueBroadcast, _) => {
                        let func = func.clone();
                        self.bus.queue_broadcast(move |h| {
                            func(h, $($var.clone()),*);
                        })?;
                    }
                    (Dispatch::QueueEvent, Some(address)) => {
                        let func = func.clone();
                        self.bus.queue_event(address, move |h| {
                            func(h, $($var.clone()),*);
                        })?;
                    }
                    _ => return Err(BusError::AddressRequired(self.bus.name().to_string()).into()),
                }
                Ok(())
            }
        }
    };
}

impl_into_event!();
impl_into_event!(A1 a1);
impl_into_event!(A1 a1, A2 a2);
impl_into_event!(A1 a1, A2 a2, A3 a3);
impl_into_event!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_into_event!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_into_event!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_into_event!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);

/// The dispatchers of one reflected event
pub struct EventSender {
    name: String,
    deprecated_name: Option<String>,
    broadcast: Method,
    event: Option<Method>,
    queue_broadcast: Option<Method>,
    queue_event: Option<Method>,
    attributes: AttributeMap,
}

impl EventSender {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deprecated_name(&self) -> Option<&str> {
        self.deprecated_name.as_deref()
    }

    pub fn broadcast(&self) -> &Method {
        &self.broadcast
    }

    pub fn event(&self) -> Option<&Method> {
        self.event.as_ref()
    }

    pub fn queue_broadcast(&self) -> Option<&Method> {
        self.queue_broadcast.as_ref()
    }

    pub fn queue_event(&self) -> Option<&Method> {
        self.queue_event.as_ref()
    }

    pub fn variant(&self, kind: Dispatch) -> Option<&Method> {
        match kind {
            Dispatch::Broadcast => Some(&self.broadcast),
            Dispatch::Event => self.event.as_ref(),
            Dispatch::QueueBroadcast => self.queue_broadcast.as_ref(),
            Dispatch::QueueEvent => self.queue_event.as_ref(),
        }
    }

    /// Every dispatcher present
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        std::iter::once(&self.broadcast)
            .chain(self.event.as_ref())
            .chain(self.queue_broadcast.as_ref())
            .chain(self.queue_event.as_ref())
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("name", &self.name)
            .field("event", &self.event.is_some())
            .field("queue_broadcast", &self.queue_broadcast.is_some())
            .field("queue_event", &self.queue_event.is_some())
            .finish()
    }
}

/// Two events of one bus used as a getter/setter pair
#[derive(Clone, Debug)]
pub struct VirtualProperty {
    name: String,
    getter: String,
    setter: String,
}

impl VirtualProperty {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn getter_event(&self) -> &str {
        &self.getter
    }

    pub fn setter_event(&self) -> &str {
        &self.setter
    }
}

type QueueFn = Box<dyn Fn(Box<dyn FnOnce() + Send>) -> void_event::Result<()> + Send + Sync>;

type HandlerFactory = Box<dyn Fn() -> Box<dyn BusHandler> + Send + Sync>;

/// A reflected event bus
pub struct EventBusDesc {
    name: String,
    deprecated_name: Option<String>,
    policy: BusPolicy,
    address: Option<ParamInfo>,
    events: Vec<EventSender>,
    virtual_properties: Vec<VirtualProperty>,
    current_address: Option<Method>,
    queue_fn: Option<QueueFn>,
    handler_factory: Option<HandlerFactory>,
    attributes: AttributeMap,
}

impl EventBusDesc {
    /// Start reflecting `bus`
    pub fn builder<I, A>(bus: Arc<EventBus<I, A>>) -> EventBusBuilder<I, A>
    where
        I: ?Sized + Send + 'static,
        A: BusAddress + Reflect,
    {
        EventBusBuilder::new(bus)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deprecated_name(&self) -> Option<&str> {
        self.deprecated_name.as_deref()
    }

    pub(crate) fn clear_deprecated_name(&mut self) {
        self.deprecated_name = None;
    }

    pub fn policy(&self) -> BusPolicy {
        self.policy
    }

    /// Address parameter of an addressed bus
    pub fn address_param(&self) -> Option<&ParamInfo> {
        self.address.as_ref()
    }

    pub fn events(&self) -> &[EventSender] {
        &self.events
    }

    /// Find an event by name or deprecated name
    pub fn find_event(&self, name: &str) -> Option<&EventSender> {
        self.events
            .iter()
            .find(|e| e.name == name)
            .or_else(|| self.events.iter().find(|e| e.deprecated_name() == Some(name)))
    }

    pub fn virtual_properties(&self) -> &[VirtualProperty] {
        &self.virtual_properties
    }

    pub fn find_virtual_property(&self, name: &str) -> Option<&VirtualProperty> {
        self.virtual_properties.iter().find(|p| p.name == name)
    }

    /// `(getter, setter)` senders of a virtual property
    pub fn virtual_property_senders(&self, name: &str) -> Option<(&EventSender, &EventSender)> {
        let property = self.find_virtual_property(name)?;
        Some((self.find_event(&property.getter)?, self.find_event(&property.setter)?))
    }

    /// Method returning the address currently being dispatched on this
    /// thread, for addressed buses
    pub fn current_address(&self) -> Option<&Method> {
        self.current_address.as_ref()
    }

    /// Every dispatcher of every event, plus the current-address query
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.events
            .iter()
            .flat_map(EventSender::methods)
            .chain(self.current_address.as_ref())
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Queue an arbitrary function on the bus
    pub fn queue_function(&self, f: impl FnOnce() + Send + 'static) -> Result<()> {
        match &self.queue_fn {
            Some(queue) => Ok(queue(Box::new(f))?),
            None => Err(BusError::QueueDisabled(self.name.clone()).into()),
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler_factory.is_some()
    }

    /// Create a disconnected handler for generic hooks
    pub fn create_handler(&self) -> Result<Box<dyn BusHandler>> {
        let factory = self
            .handler_factory
            .as_ref()
            .ok_or_else(|| ReflectError::not_found("handler", &self.name))?;
        Ok(factory())
    }
}

impl fmt::Debug for EventBusDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBusDesc")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("events", &self.events)
            .field("handler", &self.has_handler())
            .finish()
    }
}

/// Builds an [`EventBusDesc`] for a bus with interface `I` and address `A`
pub struct EventBusBuilder<I: ?Sized, A> {
    bus: Arc<EventBus<I, A>>,
    desc: EventBusDesc,
}

impl<I, A> EventBusBuilder<I, A>
where
    I: ?Sized + Send + 'static,
    A: BusAddress + Reflect,
{
    fn new(bus: Arc<EventBus<I, A>>) -> Self {
        let policy = bus.policy();
        let current_address = policy.is_addressed().then(|| {
            let bus = Arc::clone(&bus);
            Method::from_fn(format!("{}::GetCurrentBusId", bus.name()), move || bus.current_address())
        });
        let queue_fn = policy.is_queued().then(|| {
            let bus = Arc::clone(&bus);
            Box::new(move |f: Box<dyn FnOnce() + Send>| bus.queue_function(f)) as QueueFn
        });
        let desc = EventBusDesc {
            name: bus.name().to_string(),
            deprecated_name: None,
            policy,
            address: policy.is_addressed().then(ParamInfo::of::<A>),
            events: Vec::new(),
            virtual_properties: Vec::new(),
            current_address,
            queue_fn,
            handler_factory: None,
            attributes: AttributeMap::new(),
        };
        Self { bus, desc }
    }

    /// Reflect one event. `f` calls the matching method of `I`.
    pub fn event<M, F: IntoEvent<I, M>>(self, name: &str, f: F) -> Result<Self> {
        self.event_with(name, f, &[])
    }

    /// Reflect one event with argument names
    pub fn event_with<M, F: IntoEvent<I, M>>(mut self, name: &str, f: F, arg_names: &[&str]) -> Result<Self> {
        if self.desc.events.iter().any(|e| e.name == name) {
            return Err(ReflectError::conflict("event", format!("{}::{}", self.desc.name, name)));
        }
        let params = F::params();
        let make = |kind: Dispatch, f: F| {
            let mut params = params.clone();
            let mut names: Vec<&str> = arg_names.to_vec();
            if kind.is_queued() {
                params[0] = ParamInfo::void();
            }
            if kind.is_addressed() {
                params.insert(1, ParamInfo::of::<A>());
                names.insert(0, "address");
            }
            let method = Method::from_raw(
                format!("{}::{}", self.desc.name, name),
                Signature::function(params),
                f.dispatcher(Arc::clone(&self.bus), kind),
            )
            .with_argument_names(&names);
            if kind.is_addressed() {
                method.with_bus_id()
            } else {
                method
            }
        };

        let policy = self.desc.policy;
        let sender = EventSender {
            name: name.to_string(),
            deprecated_name: None,
            broadcast: make(Dispatch::Broadcast, f.clone()),
            event: policy.is_addressed().then(|| make(Dispatch::Event, f.clone())),
            queue_broadcast: policy.is_queued().then(|| make(Dispatch::QueueBroadcast, f.clone())),
            queue_event: (policy.is_addressed() && policy.is_queued())
                .then(|| make(Dispatch::QueueEvent, f.clone())),
            attributes: AttributeMap::new(),
        };
        log::debug!("Reflected event '{}::{}'", self.desc.name, name);
        self.desc.events.push(sender);
        Ok(self)
    }

    /// Give an event a deprecated name. Collisions drop the deprecated name.
    pub fn deprecated_event_name(mut self, event: &str, deprecated: &str) -> Result<Self> {
        let collides = self
            .desc
            .events
            .iter()
            .any(|e| e.name == deprecated || e.deprecated_name() == Some(deprecated));
        let sender = self
            .desc
            .events
            .iter_mut()
            .find(|e| e.name == event)
            .ok_or_else(|| ReflectError::not_found("event", event))?;
        if collides {
            log::warn!(
                "Deprecated name '{}' of event '{}' collides with an existing event; dropped",
                deprecated,
                event
            );
        } else {
            sender.deprecated_name = Some(deprecated.to_string());
        }
        Ok(self)
    }

    /// Attach an attribute to an event
    pub fn event_attribute<V: Any + Send + Sync>(mut self, event: &str, key: &str, value: V) -> Result<Self> {
        let sender = self
            .desc
            .events
            .iter_mut()
            .find(|e| e.name == event)
            .ok_or_else(|| ReflectError::not_found("event", event))?;
        sender.attributes.insert(key, value);
        Ok(self)
    }

    /// Pair two reflected events as a property. The getter takes nothing
    /// beyond the address and returns a value; the setter takes one value of
    /// the same type and returns nothing.
    pub fn virtual_property(mut self, name: &str, getter: &str, setter: &str) -> Result<Self> {
        let qualified = format!("{}::{}", self.desc.name, name);
        if self.desc.find_virtual_property(name).is_some() {
            return Err(ReflectError::conflict("virtual property", qualified));
        }
        let find = |event: &str| {
            self.desc
                .find_event(event)
                .map(EventSender::broadcast)
                .ok_or_else(|| ReflectError::not_found("event", format!("{}::{}", self.desc.name, event)))
        };
        let get = find(getter)?;
        let set = find(setter)?;
        if get.num_arguments() != 0 || !get.has_result() {
            return Err(ReflectError::signature(
                &qualified,
                format!("getter event '{}' must take no arguments and return a value", getter),
            ));
        }
        if set.num_arguments() != 1 || set.has_result() {
            return Err(ReflectError::signature(
                &qualified,
                format!("setter event '{}' must take one value and return nothing", setter),
            ));
        }
        if !get.result().same_type(&set.arguments()[0]) {
            return Err(ReflectError::signature(
                &qualified,
                format!(
                    "getter returns {} but setter takes {}",
                    get.result().name(),
                    set.arguments()[0].name()
                ),
            ));
        }
        self.desc.virtual_properties.push(VirtualProperty {
            name: name.to_string(),
            getter: getter.to_string(),
            setter: setter.to_string(),
        });
        Ok(self)
    }

    /// Install the handler factory. `binder` builds the event table of a new
    /// handler and `forwarder` builds the native object that feeds it.
    pub fn handler<B, H>(mut self, binder: B, forwarder: H) -> Result<Self>
    where
        B: Fn() -> HandlerBinder + Send + Sync + 'static,
        H: Fn(Arc<HandlerBinder>) -> SharedHandler<I> + Send + Sync + 'static,
    {
        binder().validate(&self.desc.name)?;
        let bus = Arc::clone(&self.bus);
        self.desc.handler_factory = Some(Box::new(move || {
            let binder = Arc::new(binder());
            let forwarder = forwarder(Arc::clone(&binder));
            Box::new(BusHandlerAdapter::new(Arc::clone(&bus), binder, forwarder)) as Box<dyn BusHandler>
        }));
        Ok(self)
    }

    pub fn deprecated_name(mut self, name: impl Into<String>) -> Self {
        self.desc.deprecated_name = Some(name.into());
        self
    }

    pub fn attribute<V: Any + Send + Sync>(mut self, key: &str, value: V) -> Self {
        self.desc.attributes.insert(key, value);
        self
    }

    pub fn build(self) -> EventBusDesc {
        self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    trait Thermostat {
        fn set_target(&mut self, degrees: f32);
        fn target(&mut self) -> f32;
    }

    type ThermostatBus = dyn Thermostat + Send;

    #[derive(Default)]
    struct Room {
        target: f32,
        writes: usize,
    }

    impl Thermostat for Room {
        fn set_target(&mut self, degrees: f32) {
            self.target = degrees;
            self.writes += 1;
        }

        fn target(&mut self) -> f32 {
            self.target
        }
    }

    fn describe(bus: &Arc<EventBus<ThermostatBus, u32>>) -> EventBusDesc {
        EventBusDesc::builder(Arc::clone(bus))
            .event_with(
                "SetTarget",
                |h: &mut ThermostatBus, degrees: f32| h.set_target(degrees),
                &["degrees"],
            )
            .unwrap()
            .event("GetTarget", |h: &mut ThermostatBus| h.target())
            .unwrap()
            .virtual_property("Target", "GetTarget", "SetTarget")
            .unwrap()
            .build()
    }

    #[test]
    fn test_variants_follow_policy() {
        let single: Arc<EventBus<ThermostatBus>> = Arc::new(EventBus::new("Single", BusPolicy::SINGLE));
        let desc = EventBusDesc::builder(single)
            .event("GetTarget", |h: &mut ThermostatBus| h.target())
            .unwrap()
            .build();
        let sender = desc.find_event("GetTarget").unwrap();
        assert!(sender.event().is_none());
        assert!(sender.queue_broadcast().is_none());
        assert!(desc.current_address().is_none());
        assert!(desc.address_param().is_none());
        assert!(matches!(
            desc.queue_function(|| {}),
            Err(ReflectError::BusPolicy(BusError::QueueDisabled(_)))
        ));

        let queued: Arc<EventBus<ThermostatBus, u32>> =
            Arc::new(EventBus::new("Queued", BusPolicy::ADDRESSED.with_queue()));
        let desc = describe(&queued);
        let sender = desc.find_event("SetTarget").unwrap();
        assert_eq!(sender.methods().count(), 4);
        let addressed = sender.event().unwrap();
        assert!(addressed.has_bus_id());
        assert_eq!(addressed.num_arguments(), 2);
        assert!(addressed.bus_id_argument().unwrap().is_type::<u32>());
        assert_eq!(addressed.argument_name(1), Some("degrees"));
        let getter = desc.find_event("GetTarget").unwrap();
        assert!(getter.broadcast().result().is_type::<f32>());
        assert!(getter.queue_broadcast().unwrap().result().is_void());
    }

    #[test]
    fn test_addressed_dispatch_and_queue() {
        let bus: Arc<EventBus<ThermostatBus, u32>> =
            Arc::new(EventBus::new("Thermostat", BusPolicy::ADDRESSED.with_queue()));
        let kitchen = Arc::new(Mutex::new(Room::default()));
        let hall = Arc::new(Mutex::new(Room::default()));
        bus.connect_to(1, kitchen.clone() as SharedHandler<ThermostatBus>).unwrap();
        bus.connect_to(2, hall.clone() as SharedHandler<ThermostatBus>).unwrap();
        let desc = describe(&bus);
        let set = desc.find_event("SetTarget").unwrap();

        let (mut address, mut degrees) = (1u32, 21.5f32);
        assert!(set
            .event()
            .unwrap()
            .call(&mut [ValueSlot::new(&mut address), ValueSlot::new(&mut degrees)], None));
        assert_eq!(kitchen.lock().target, 21.5);
        assert_eq!(hall.lock().writes, 0);

        let mut degrees = 18.0f32;
        assert!(set.broadcast().call(&mut [ValueSlot::new(&mut degrees)], None));
        assert_eq!(hall.lock().target, 18.0);

        let mut address = 2u32;
        let mut degrees = 25.0f32;
        assert!(set
            .queue_event()
            .unwrap()
            .call(&mut [ValueSlot::new(&mut address), ValueSlot::new(&mut degrees)], None));
        assert_eq!(hall.lock().target, 18.0);
        assert_eq!(bus.execute_queue(), 1);
        assert_eq!(hall.lock().target, 25.0);

        let mut address = 1u32;
        let mut result = ValueSlot::untyped();
        let get = desc.find_event("GetTarget").unwrap();
        assert!(get
            .event()
            .unwrap()
            .call(&mut [ValueSlot::new(&mut address)], Some(&mut result)));
        assert_eq!(result.get::<f32>(), Some(&18.0));
    }

    #[test]
    fn test_virtual_property_validation() {
        let bus: Arc<EventBus<ThermostatBus, u32>> = Arc::new(EventBus::new("Thermostat", BusPolicy::ADDRESSED));
        let desc = describe(&bus);
        let (getter, setter) = desc.virtual_property_senders("Target").unwrap();
        assert_eq!(getter.name(), "GetTarget");
        assert_eq!(setter.name(), "SetTarget");

        let swapped = EventBusDesc::builder(Arc::clone(&bus))
            .event("SetTarget", |h: &mut ThermostatBus, d: f32| h.set_target(d))
            .unwrap()
            .event("GetTarget", |h: &mut ThermostatBus| h.target())
            .unwrap()
            .virtual_property("Target", "SetTarget", "GetTarget");
        assert!(matches!(swapped, Err(ReflectError::SignatureMismatch { .. })));

        let duplicate = EventBusDesc::builder(bus)
            .event("GetTarget", |h: &mut ThermostatBus| h.target())
            .unwrap()
            .event("GetTarget", |h: &mut ThermostatBus| h.target());
        assert!(matches!(duplicate, Err(ReflectError::RegistrationConflict { .. })));
    }

    #[test]
    fn test_current_address_method() {
        let bus: Arc<EventBus<ThermostatBus, u32>> = Arc::new(EventBus::new("Thermostat", BusPolicy::ADDRESSED));
        let desc = describe(&bus);
        let mut result = ValueSlot::untyped();
        assert!(desc.current_address().unwrap().call(&mut [], Some(&mut result)));
        assert_eq!(result.get::<Option<u32>>(), Some(&None));
        assert_eq!(desc.events().len(), 2);
    }

    #[test]
    fn test_deprecated_event_names() {
        let bus: Arc<EventBus<ThermostatBus, u32>> = Arc::new(EventBus::new("Thermostat", BusPolicy::ADDRESSED));
        let desc = EventBusDesc::builder(bus)
            .event("GetTarget", |h: &mut ThermostatBus| h.target())
            .unwrap()
            .event("SetTarget", |h: &mut ThermostatBus, d: f32| h.set_target(d))
            .unwrap()
            .deprecated_event_name("GetTarget", "ReadTarget")
            .unwrap()
            .deprecated_event_name("SetTarget", "GetTarget")
            .unwrap()
            .build();
        assert_eq!(desc.find_event("ReadTarget").unwrap().name(), "GetTarget");
        assert!(desc.find_event("SetTarget").unwrap().deprecated_name().is_none());
    }
}
