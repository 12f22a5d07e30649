//! Script bridge demonstration
//!
//! This example shows:
//! - Mirroring registry contents into a binding table through observers
//! - Calling functions by name with default arguments
//! - Reading and writing class properties on a native instance
//! - Driving a reflected event bus and hooking its handler events

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use void_event::{BusPolicy, EventBus, SharedHandler};
use void_reflect::prelude::*;

/// Binding table a script VM would expose
#[derive(Default)]
struct ScriptBindings {
    globals: BTreeMap<String, &'static str>,
}

impl ContextEvents for ScriptBindings {
    fn on_add_method(&mut self, method: &Method) {
        self.globals.insert(method.name().to_string(), "function");
    }

    fn on_add_property(&mut self, property: &Property) {
        self.globals.insert(property.name().to_string(), "global");
    }

    fn on_add_class(&mut self, class: &Class) {
        self.globals.insert(class.name().to_string(), "class");
    }

    fn on_add_event_bus(&mut self, bus: &EventBusDesc) {
        self.globals.insert(bus.name().to_string(), "event bus");
    }

    fn on_remove_method(&mut self, method: &Method) {
        self.globals.remove(method.name());
    }

    fn on_remove_property(&mut self, property: &Property) {
        self.globals.remove(property.name());
    }

    fn on_remove_class(&mut self, class: &Class) {
        self.globals.remove(class.name());
    }

    fn on_remove_event_bus(&mut self, bus: &EventBusDesc) {
        self.globals.remove(bus.name());
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Player {
    name: String,
    health: i32,
}

impl Reflect for Player {
    fn type_name() -> &'static str {
        "Player"
    }
}

trait HealthNotifications {
    fn on_damaged(&mut self, amount: i32);
}

type HealthBus = dyn HealthNotifications + Send;

struct HealthForwarder(Arc<HandlerBinder>);

impl HealthNotifications for HealthForwarder {
    fn on_damaged(&mut self, amount: i32) {
        self.0.call(0, (amount,));
    }
}

fn main() -> void_reflect::Result<()> {
    // Initialize logging
    env_logger::init();

    println!("Script Bridge Demo");
    println!("==================\n");

    let mut registry = ContextRegistry::new();
    let bindings = Arc::new(Mutex::new(ScriptBindings::default()));
    registry
        .observers()
        .connect(bindings.clone() as SharedHandler<ContextObservers>)?;

    registry.register_method(
        Method::from_fn("clamp", |v: i32, lo: i32, hi: i32| v.clamp(lo, hi))
            .with_argument_names(&["value", "lo", "hi"])
            .with_default(1, 0i32)?
            .with_default(2, 100i32)?,
    )?;
    registry.register_constant("MaxHealth", 100i32)?;
    registry.register_class(
        Class::builder::<Player>("Player")
            .default_constructible()
            .cloneable()
            .method("Heal", |p: &mut Player, by: i32| p.health = (p.health + by).min(100))?
            .property("Health", |p: &Player| p.health, |p: &mut Player, v: i32| p.health = v)?
            .build(),
    )?;

    let bus: Arc<EventBus<HealthBus>> = Arc::new(EventBus::new("Health", BusPolicy::SINGLE));
    registry.register_event_bus(
        EventBusDesc::builder(Arc::clone(&bus))
            .event_with("Damaged", |h: &mut HealthBus, amount: i32| h.on_damaged(amount), &["amount"])?
            .handler(
                || HandlerBinder::builder().event::<(i32,), ()>("OnDamaged").build(),
                |binder| Arc::new(Mutex::new(HealthForwarder(binder))) as SharedHandler<HealthBus>,
            )?
            .build(),
    )?;

    println!("Bindings:");
    for (name, kind) in &bindings.lock().globals {
        println!("  {:<10} {}", name, kind);
    }

    // Function call with defaults
    let mut value = 250;
    let mut result = ValueSlot::result_of::<i32>();
    registry.call("clamp", &mut [ValueSlot::new(&mut value)], Some(&mut result));
    println!("\nclamp(250) = {:?}", result.take::<i32>());

    // Class instance driven by name
    if let Some(class) = registry.find_class("Player") {
        let mut player = Player {
            name: "Ada".into(),
            health: 40,
        };
        let mut amount = 75;
        if let Some(heal) = class.find_method("Heal") {
            heal.try_call(&mut [ValueSlot::new(&mut player), ValueSlot::new(&mut amount)], None)?;
        }
        if let Some(health) = class.find_property("Health") {
            let current = health.get_value::<i32>(Some(&mut ValueSlot::new(&mut player)))?;
            println!("{} healed to {}", player.name, current);
        }
    }

    // Hooked handler on the reflected bus
    if let Some(desc) = registry.find_event_bus("Health") {
        let mut handler = desc.create_handler()?;
        handler
            .binder()
            .install_hook("OnDamaged", |amount: i32| println!("script saw {} damage", amount))?;
        handler.connect(None)?;

        let mut amount = 12;
        if let Some(damaged) = desc.find_event("Damaged") {
            damaged.broadcast().try_call(&mut [ValueSlot::new(&mut amount)], None)?;
        }
        handler.disconnect(None);
    }

    registry.clear();
    println!("\nRemaining bindings after clear: {}", bindings.lock().globals.len());
    Ok(())
}
