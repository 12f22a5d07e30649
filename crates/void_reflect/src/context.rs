//! Context registry
//!
//! The top-level store owning every reflected method, property, class and
//! event bus. Registration happens up front (or around a module load) and is
//! expected to finish before concurrent invocation starts; lookups and calls
//! only need `&self`.
//!
//! Observers implementing [`ContextEvents`] connect to
//! [`ContextRegistry::observers`] and are notified synchronously of every
//! addition and removal.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use void_core::Reflect;
use void_event::{BusPolicy, EventBus};

use crate::attribute::keys;
use crate::class::Class;
use crate::config::ReflectConfig;
use crate::ebus::EventBusDesc;
use crate::error::{ReflectError, Result};
use crate::method::Method;
use crate::property::Property;
use crate::slot::ValueSlot;

/// Registry change notifications. Every method defaults to doing nothing.
pub trait ContextEvents {
    fn on_add_method(&mut self, _method: &Method) {}
    fn on_remove_method(&mut self, _method: &Method) {}
    fn on_add_property(&mut self, _property: &Property) {}
    fn on_remove_property(&mut self, _property: &Property) {}
    fn on_add_class(&mut self, _class: &Class) {}
    fn on_remove_class(&mut self, _class: &Class) {}
    fn on_add_event_bus(&mut self, _bus: &EventBusDesc) {}
    fn on_remove_event_bus(&mut self, _bus: &EventBusDesc) {}
}

/// Handler interface of the observer bus
pub type ContextObservers = dyn ContextEvents + Send;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Entry {
    Method(String),
    Property(String),
    Class(String),
    EventBus(String),
}

/// Owner of all reflected descriptors
pub struct ContextRegistry {
    config: ReflectConfig,
    methods: HashMap<String, Method>,
    properties: HashMap<String, Property>,
    classes: HashMap<String, Class>,
    class_by_type: HashMap<TypeId, String>,
    buses: HashMap<String, EventBusDesc>,
    /// Registration order, replayed backwards by `clear`
    order: Vec<Entry>,
    observers: EventBus<ContextObservers>,
}

impl ContextRegistry {
    /// Registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(ReflectConfig::default())
    }

    pub fn with_config(config: ReflectConfig) -> Self {
        Self {
            config,
            methods: HashMap::new(),
            properties: HashMap::new(),
            classes: HashMap::new(),
            class_by_type: HashMap::new(),
            buses: HashMap::new(),
            order: Vec::new(),
            observers: EventBus::new("ContextEvents", BusPolicy::SINGLE),
        }
    }

    pub fn config(&self) -> &ReflectConfig {
        &self.config
    }

    /// Bus to connect [`ContextEvents`] observers to
    pub fn observers(&self) -> &EventBus<ContextObservers> {
        &self.observers
    }

    fn conflict(kind: &'static str, name: &str) -> ReflectError {
        log::error!("Failed to register {} '{}': name already in use", kind, name);
        ReflectError::conflict(kind, name)
    }

    fn check_arity(&self, method: &Method) -> Result<()> {
        for entry in method.overloads() {
            if entry.num_arguments() > self.config.max_parameters {
                return Err(ReflectError::signature(
                    entry.name(),
                    format!(
                        "{} parameters exceed the limit of {}",
                        entry.num_arguments(),
                        self.config.max_parameters
                    ),
                ));
            }
        }
        Ok(())
    }

    // ========== Global Methods ==========

    /// Register a global method. Its name must be unused.
    pub fn register_method(&mut self, mut method: Method) -> Result<()> {
        if self.methods.contains_key(method.name()) {
            return Err(Self::conflict("method", method.name()));
        }
        self.check_arity(&method)?;
        if let Some(deprecated) = method.deprecated_name() {
            let collides = self.methods.contains_key(deprecated)
                || self.methods.values().any(|m| m.deprecated_name() == Some(deprecated));
            if collides {
                log::warn!(
                    "Deprecated name '{}' of method '{}' is already in use; dropped",
                    deprecated,
                    method.name()
                );
                method.clear_deprecated_name();
            }
        }

        let name = method.name().to_string();
        log::debug!("Registered method '{}'", name);
        self.order.push(Entry::Method(name.clone()));
        let method = self.methods.entry(name).or_insert(method);
        self.observers.broadcast(|o| o.on_add_method(method));
        Ok(())
    }

    /// Register `method`, chaining it as an overload if the name is taken
    pub fn register_overload(&mut self, method: Method) -> Result<()> {
        self.check_arity(&method)?;
        let Some(existing) = self.methods.get_mut(method.name()) else {
            return self.register_method(method);
        };
        let name = method.name().to_string();
        if let Err(err) = existing.add_overload(method) {
            log::error!("Failed to add overload of '{}': {}", name, err);
            return Err(err);
        }
        if let Some(added) = existing.overloads().last() {
            self.observers.broadcast(|o| o.on_add_method(added));
        }
        Ok(())
    }

    pub fn unregister_method(&mut self, name: &str) -> Result<()> {
        let method = self
            .methods
            .remove(name)
            .ok_or_else(|| ReflectError::not_found("method", name))?;
        self.order.retain(|e| *e != Entry::Method(name.to_string()));
        for removed in method.into_overloads() {
            self.observers.broadcast(|o| o.on_remove_method(&removed));
        }
        log::debug!("Unregistered method '{}'", name);
        Ok(())
    }

    /// Find a global method by name, or by deprecated name when enabled
    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name).or_else(|| {
            if !self.config.deprecated_name_lookup {
                return None;
            }
            self.methods.values().find(|m| m.deprecated_name() == Some(name))
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.values()
    }

    /// Call a global method by name, picking the first overload that accepts
    /// `args`. Failures are logged and reported as false.
    pub fn call(&self, name: &str, args: &mut [ValueSlot<'_>], result: Option<&mut ValueSlot<'_>>) -> bool {
        let Some(method) = self.find_method(name) else {
            log::warn!("{}", ReflectError::not_found("method", name));
            return false;
        };
        let method = if method.is_overloaded() {
            method.select_overload(args).unwrap_or(method)
        } else {
            method
        };
        method.call(args, result)
    }

    // ========== Global Properties ==========

    pub fn register_property(&mut self, property: Property) -> Result<()> {
        if self.properties.contains_key(property.name()) {
            return Err(Self::conflict("property", property.name()));
        }
        if let Some(getter) = property.getter() {
            self.check_arity(getter)?;
        }
        if let Some(setter) = property.setter() {
            self.check_arity(setter)?;
        }

        let name = property.name().to_string();
        log::debug!("Registered property '{}'", name);
        self.order.push(Entry::Property(name.clone()));
        let property = self.properties.entry(name).or_insert(property);
        self.observers.broadcast(|o| o.on_add_property(property));
        Ok(())
    }

    /// Register a read-only global holding `value`
    pub fn register_constant<T: Reflect + Clone>(&mut self, name: &str, value: T) -> Result<()> {
        let getter = Method::from_fn(name, move || value.clone());
        self.register_property(Property::bind(name, Some(getter), None)?)
    }

    /// Register a constant tagged with the enumeration it belongs to
    pub fn register_enum_value<E: Reflect + Clone>(&mut self, name: &str, value: E) -> Result<()> {
        let getter = Method::from_fn(name, move || value.clone());
        let mut property = Property::bind(name, Some(getter), None)?;
        property.attributes_mut().insert(keys::ENUM_TYPE, E::type_name());
        self.register_property(property)
    }

    pub fn unregister_property(&mut self, name: &str) -> Result<()> {
        let property = self
            .properties
            .remove(name)
            .ok_or_else(|| ReflectError::not_found("property", name))?;
        self.order.retain(|e| *e != Entry::Property(name.to_string()));
        self.observers.broadcast(|o| o.on_remove_property(&property));
        log::debug!("Unregistered property '{}'", name);
        Ok(())
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    // ========== Classes ==========

    /// Register a class. Both its name and its type must be new.
    pub fn register_class(&mut self, class: Class) -> Result<()> {
        if self.classes.contains_key(class.name()) {
            return Err(Self::conflict("class", class.name()));
        }
        if let Some(existing) = self.class_by_type.get(&class.type_id()) {
            log::error!(
                "Failed to register class '{}': type {} is already reflected as '{}'",
                class.name(),
                class.type_info().name,
                existing
            );
            return Err(ReflectError::conflict("class", class.type_info().name));
        }
        if let Some(constructor) = class.constructor() {
            self.check_arity(constructor)?;
        }
        for method in class.methods() {
            self.check_arity(method)?;
            if !self.config.class_method_overloads && method.is_overloaded() {
                return Err(Self::conflict("method", &format!("{}::{}", class.name(), method.name())));
            }
        }

        let name = class.name().to_string();
        log::debug!(
            "Registered class '{}' ({} methods, {} properties)",
            name,
            class.methods().count(),
            class.properties().count()
        );
        self.class_by_type.insert(class.type_id(), name.clone());
        self.order.push(Entry::Class(name.clone()));
        let class = self.classes.entry(name).or_insert(class);
        self.observers.broadcast(|o| o.on_add_class(class));
        Ok(())
    }

    /// Remove a class together with its methods and properties
    pub fn unregister_class(&mut self, name: &str) -> Result<()> {
        let mut class = self
            .classes
            .remove(name)
            .ok_or_else(|| ReflectError::not_found("class", name))?;
        self.class_by_type.remove(&class.type_id());
        self.order.retain(|e| *e != Entry::Class(name.to_string()));

        let (methods, properties) = class.take_members();
        for method in &methods {
            self.observers.broadcast(|o| o.on_remove_method(method));
        }
        for property in &properties {
            self.observers.broadcast(|o| o.on_remove_property(property));
        }
        self.observers.broadcast(|o| o.on_remove_class(&class));
        log::debug!(
            "Unregistered class '{}' ({} methods, {} properties)",
            name,
            methods.len(),
            properties.len()
        );
        Ok(())
    }

    pub fn find_class(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    pub fn find_class_by_type(&self, type_id: TypeId) -> Option<&Class> {
        self.class_by_type
            .get(&type_id)
            .and_then(|name| self.classes.get(name))
    }

    pub fn find_class_of<T: 'static>(&self) -> Option<&Class> {
        self.find_class_by_type(TypeId::of::<T>())
    }

    pub fn is_type_reflected(&self, type_id: TypeId) -> bool {
        self.class_by_type.contains_key(&type_id)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.values()
    }

    // ========== Event Buses ==========

    pub fn register_event_bus(&mut self, mut bus: EventBusDesc) -> Result<()> {
        if self.buses.contains_key(bus.name()) {
            return Err(Self::conflict("event bus", bus.name()));
        }
        for method in bus.methods() {
            self.check_arity(method)?;
        }
        if let Some(deprecated) = bus.deprecated_name() {
            let collides = self.buses.contains_key(deprecated)
                || self.buses.values().any(|b| b.deprecated_name() == Some(deprecated));
            if collides {
                log::warn!(
                    "Deprecated name '{}' of event bus '{}' is already in use; dropped",
                    deprecated,
                    bus.name()
                );
                bus.clear_deprecated_name();
            }
        }

        let name = bus.name().to_string();
        log::debug!("Registered event bus '{}' ({} events)", name, bus.events().len());
        self.order.push(Entry::EventBus(name.clone()));
        let bus = self.buses.entry(name).or_insert(bus);
        self.observers.broadcast(|o| o.on_add_event_bus(bus));
        Ok(())
    }

    pub fn unregister_event_bus(&mut self, name: &str) -> Result<()> {
        let bus = self
            .buses
            .remove(name)
            .ok_or_else(|| ReflectError::not_found("event bus", name))?;
        self.order.retain(|e| *e != Entry::EventBus(name.to_string()));
        self.observers.broadcast(|o| o.on_remove_event_bus(&bus));
        log::debug!("Unregistered event bus '{}'", name);
        Ok(())
    }

    /// Find a bus by name, or by deprecated name when enabled
    pub fn find_event_bus(&self, name: &str) -> Option<&EventBusDesc> {
        self.buses.get(name).or_else(|| {
            if !self.config.deprecated_name_lookup {
                return None;
            }
            self.buses.values().find(|b| b.deprecated_name() == Some(name))
        })
    }

    pub fn event_buses(&self) -> impl Iterator<Item = &EventBusDesc> {
        self.buses.values()
    }

    // ========== Teardown ==========

    /// Unregister everything, most recent registration first
    pub fn clear(&mut self) {
        while let Some(entry) = self.order.last().cloned() {
            let result = match &entry {
                Entry::Method(name) => self.unregister_method(name),
                Entry::Property(name) => self.unregister_property(name),
                Entry::Class(name) => self.unregister_class(name),
                Entry::EventBus(name) => self.unregister_event_bus(name),
            };
            if let Err(err) = result {
                log::warn!("{}", err);
                self.order.pop();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .field("classes", &self.classes.len())
            .field("event_buses", &self.buses.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use void_event::SharedHandler;

    #[derive(Default)]
    struct Journal(Vec<String>);

    impl ContextEvents for Journal {
        fn on_add_method(&mut self, method: &Method) {
            self.0.push(format!("+method {}", method.name()));
        }
        fn on_remove_method(&mut self, method: &Method) {
            self.0.push(format!("-method {}", method.name()));
        }
        fn on_add_property(&mut self, property: &Property) {
            self.0.push(format!("+property {}", property.name()));
        }
        fn on_remove_property(&mut self, property: &Property) {
            self.0.push(format!("-property {}", property.name()));
        }
        fn on_add_class(&mut self, class: &Class) {
            self.0.push(format!("+class {}", class.name()));
        }
        fn on_remove_class(&mut self, class: &Class) {
            self.0.push(format!("-class {}", class.name()));
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Gauge {
        level: i32,
    }

    impl Reflect for Gauge {
        fn type_name() -> &'static str {
            "Gauge"
        }
    }

    fn gauge_class(name: &str) -> Class {
        Class::builder::<Gauge>(name)
            .default_constructible()
            .method("Level", |g: &Gauge| g.level)
            .unwrap()
            .property("Value", |g: &Gauge| g.level, |g: &mut Gauge, v: i32| g.level = v)
            .unwrap()
            .build()
    }

    fn journal(registry: &ContextRegistry) -> Arc<Mutex<Journal>> {
        let journal = Arc::new(Mutex::new(Journal::default()));
        registry
            .observers()
            .connect(journal.clone() as SharedHandler<ContextObservers>)
            .unwrap();
        journal
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut registry = ContextRegistry::new();
        registry
            .register_method(Method::from_fn("double", |a: i32| a * 2))
            .unwrap();
        let err = registry
            .register_method(Method::from_fn("double", |a: f32| a * 2.0))
            .unwrap_err();
        assert!(matches!(err, ReflectError::RegistrationConflict { .. }));
        assert!(registry.find_method("double").unwrap().argument(0).unwrap().is_type::<i32>());
    }

    #[test]
    fn test_overloads_and_call_by_name() {
        let mut registry = ContextRegistry::new();
        registry
            .register_overload(Method::from_fn("double", |a: i32| a * 2))
            .unwrap();
        registry
            .register_overload(Method::from_fn("double", |a: f32| a * 2.0))
            .unwrap();
        assert!(registry.find_method("double").unwrap().is_overloaded());

        let mut x = 1.25f32;
        let mut result = ValueSlot::untyped();
        assert!(registry.call("double", &mut [ValueSlot::new(&mut x)], Some(&mut result)));
        assert_eq!(result.get::<f32>(), Some(&2.5));
        assert!(!registry.call("triple", &mut [], None));
    }

    #[test]
    fn test_deprecated_lookup() {
        let mut registry = ContextRegistry::new();
        registry
            .register_method(Method::from_fn("Length", |s: String| s.len()).with_deprecated_name("Len"))
            .unwrap();
        registry
            .register_method(Method::from_fn("Size", |s: String| s.len()).with_deprecated_name("Len"))
            .unwrap();
        assert_eq!(registry.find_method("Len").unwrap().name(), "Length");
        assert!(registry.find_method("Size").unwrap().deprecated_name().is_none());

        let mut strict = ContextRegistry::with_config(ReflectConfig {
            deprecated_name_lookup: false,
            ..ReflectConfig::default()
        });
        strict
            .register_method(Method::from_fn("Length", |s: String| s.len()).with_deprecated_name("Len"))
            .unwrap();
        assert!(strict.find_method("Len").is_none());
    }

    #[test]
    fn test_parameter_limit() {
        let mut registry = ContextRegistry::with_config(ReflectConfig {
            max_parameters: 2,
            ..ReflectConfig::default()
        });
        assert!(matches!(
            registry.register_method(Method::from_fn("sum3", |a: i32, b: i32, c: i32| a + b + c)),
            Err(ReflectError::SignatureMismatch { .. })
        ));
        assert!(registry
            .register_method(Method::from_fn("sum2", |a: i32, b: i32| a + b))
            .is_ok());
    }

    #[test]
    fn test_class_conflicts() {
        let mut registry = ContextRegistry::new();
        registry.register_class(gauge_class("Gauge")).unwrap();
        assert!(matches!(
            registry.register_class(gauge_class("Meter")),
            Err(ReflectError::RegistrationConflict { .. })
        ));
        assert!(registry.find_class("Meter").is_none());
        assert_eq!(registry.find_class_of::<Gauge>().unwrap().name(), "Gauge");
        assert!(registry.is_type_reflected(TypeId::of::<Gauge>()));

        let mut strict = ContextRegistry::with_config(ReflectConfig {
            class_method_overloads: false,
            ..ReflectConfig::default()
        });
        let overloaded = Class::builder::<Gauge>("Gauge")
            .method("Add", |g: &mut Gauge, by: i32| g.level += by)
            .unwrap()
            .method("Add", |g: &mut Gauge, a: i32, b: i32| g.level += a + b)
            .unwrap()
            .build();
        assert!(strict.register_class(overloaded).is_err());
        assert!(!strict.is_type_reflected(TypeId::of::<Gauge>()));
    }

    #[test]
    fn test_observers_and_cascade() {
        let mut registry = ContextRegistry::new();
        let journal = journal(&registry);
        registry.register_class(gauge_class("Gauge")).unwrap();
        registry.unregister_class("Gauge").unwrap();

        let entries = journal.lock().0.clone();
        assert_eq!(entries.first().map(String::as_str), Some("+class Gauge"));
        assert!(entries.contains(&"-method Level".to_string()));
        assert!(entries.contains(&"-property Value".to_string()));
        assert_eq!(entries.last().map(String::as_str), Some("-class Gauge"));
        assert!(registry.find_class_of::<Gauge>().is_none());
        assert!(matches!(
            registry.unregister_class("Gauge"),
            Err(ReflectError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unregister_overloads_notifies_each() {
        let mut registry = ContextRegistry::new();
        let journal = journal(&registry);
        registry
            .register_overload(Method::from_fn("double", |v: i32| v * 2))
            .unwrap();
        registry
            .register_overload(Method::from_fn("double", |v: f32| v * 2.0))
            .unwrap();
        registry.unregister_method("double").unwrap();

        let entries = journal.lock().0.clone();
        let adds = entries.iter().filter(|e| *e == "+method double").count();
        let removes = entries.iter().filter(|e| *e == "-method double").count();
        assert_eq!((adds, removes), (2, 2));
        assert!(registry.find_method("double").is_none());
    }

    #[test]
    fn test_clear_in_reverse_order() {
        let mut registry = ContextRegistry::new();
        registry
            .register_method(Method::from_fn("first", || 1i32))
            .unwrap();
        registry.register_constant("Answer", 42i64).unwrap();
        registry
            .register_method(Method::from_fn("last", || 3i32))
            .unwrap();
        let journal = journal(&registry);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(
            journal.lock().0,
            vec!["-method last", "-property Answer", "-method first"]
        );
    }

    #[test]
    fn test_constants_and_enum_values() {
        #[derive(Clone, Copy, Debug, PartialEq)]
        #[repr(u8)]
        enum Quality {
            Low = 1,
            High = 2,
        }

        impl Reflect for Quality {
            fn type_name() -> &'static str {
                "Quality"
            }
        }

        let mut registry = ContextRegistry::new();
        registry.register_constant("MaxPlayers", 16u32).unwrap();
        registry.register_enum_value("Quality_Low", Quality::Low).unwrap();
        registry.register_enum_value("Quality_High", Quality::High).unwrap();
        assert!(registry.register_constant("MaxPlayers", 8u32).is_err());

        let players = registry.find_property("MaxPlayers").unwrap();
        assert!(players.is_read_only());
        assert_eq!(players.get_value::<u32>(None).unwrap(), 16);

        let high = registry.find_property("Quality_High").unwrap();
        assert_eq!(high.attributes().get::<&str>(keys::ENUM_TYPE), Some(&"Quality"));
        assert_eq!(high.get_value::<Quality>(None).unwrap(), Quality::High);
        let low = registry.find_property("Quality_Low").unwrap();
        assert_eq!(low.get_value::<Quality>(None).unwrap() as u8, 1);
    }
}
