//! Integration tests for reflected classes and properties

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use void_event::SharedHandler;
use void_reflect::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Vector {
    x: f32,
    y: f32,
}

impl Hash for Vector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

impl Reflect for Vector {
    fn type_name() -> &'static str {
        "Vector"
    }
}

#[derive(Clone, Debug, Default)]
struct Color {
    rgba: u32,
}

impl Reflect for Color {
    fn type_name() -> &'static str {
        "Color"
    }
}

fn vector_class(reads: Arc<AtomicUsize>) -> Class {
    Class::builder::<Vector>("Vector")
        .default_constructible()
        .cloneable()
        .comparable()
        .hashable()
        .constructor(|x: f32, y: f32| Vector { x, y })
        .unwrap()
        .method("GetX", move |v: &Vector| {
            reads.fetch_add(1, Ordering::SeqCst);
            v.x
        })
        .unwrap()
        .method("Scale", |v: &mut Vector, by: f32| {
            v.x *= by;
            v.y *= by;
        })
        .unwrap()
        .property("Y", |v: &Vector| v.y, |v: &mut Vector, y: f32| v.y = y)
        .unwrap()
        .constant("Dimensions", 2u32)
        .unwrap()
        .attribute(keys::CATEGORY, "Math")
        .build()
}

#[test]
fn test_duplicate_class_keeps_first() {
    init_logging();
    let mut registry = ContextRegistry::new();
    registry.register_class(vector_class(Arc::default())).unwrap();

    let second = Class::builder::<Vector>("Vector")
        .method("Length", |v: &Vector| (v.x * v.x + v.y * v.y).sqrt())
        .unwrap()
        .build();
    assert!(matches!(
        registry.register_class(second),
        Err(ReflectError::RegistrationConflict { .. })
    ));

    let class = registry.find_class("Vector").unwrap();
    assert!(class.find_method("GetX").is_some());
    assert!(class.find_method("Length").is_none());
    assert_eq!(class.attributes().get::<&str>(keys::CATEGORY), Some(&"Math"));
}

#[test]
fn test_member_call_rejects_unrelated_this() {
    init_logging();
    let reads = Arc::new(AtomicUsize::new(0));
    let class = vector_class(reads.clone());
    let get_x = class.find_method("GetX").unwrap();
    assert!(get_x.is_member());
    assert!(get_x.is_const());

    let mut color = Color { rgba: 0xff00_00ff };
    let err = get_x
        .try_call(&mut [ValueSlot::new(&mut color)], None)
        .unwrap_err();
    assert!(matches!(err, ReflectError::InvalidThisPointer { .. }));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert_eq!(color.rgba, 0xff00_00ff);

    let mut vector = Vector { x: 3.0, y: 4.0 };
    let mut result = ValueSlot::untyped();
    assert!(get_x.call(&mut [ValueSlot::new(&mut vector)], Some(&mut result)));
    assert_eq!(result.get::<f32>(), Some(&3.0));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_const_receiver_rejected_for_mutating_method() {
    let class = vector_class(Arc::default());
    let scale = class.find_method("Scale").unwrap();
    let vector = Vector { x: 1.0, y: 2.0 };
    let mut by = 2.0f32;
    let err = scale
        .try_call(&mut [ValueSlot::from_ref(&vector), ValueSlot::new(&mut by)], None)
        .unwrap_err();
    assert!(matches!(err, ReflectError::InvalidThisPointer { .. }));

    let mut vector = vector;
    assert!(scale.call(&mut [ValueSlot::new(&mut vector), ValueSlot::new(&mut by)], None));
    assert_eq!(vector, Vector { x: 2.0, y: 4.0 });
}

#[test]
fn test_property_accessors_must_agree() {
    let mismatched = Class::builder::<Vector>("Vector").property(
        "X",
        |v: &Vector| v.x as i32,
        |v: &mut Vector, x: f32| v.x = x,
    );
    assert!(matches!(mismatched, Err(ReflectError::SignatureMismatch { .. })));

    let class = vector_class(Arc::default());
    let y = class.find_property("Y").unwrap();
    assert_eq!(class.find_getter("Y").unwrap().name(), "Vector::Y::Getter");
    let mut vector = Vector::default();
    let mut value = 7.5f32;
    {
        let mut this = ValueSlot::new(&mut vector);
        y.set(Some(&mut this), &mut ValueSlot::new(&mut value)).unwrap();
        assert_eq!(y.get_value::<f32>(Some(&mut this)).unwrap(), 7.5);
    }
    assert_eq!(vector.y, 7.5);

    let dimensions = class.find_property("Dimensions").unwrap();
    assert!(dimensions.is_read_only());
    assert_eq!(dimensions.get_value::<u32>(None).unwrap(), 2);
}

#[test]
fn test_instance_lifecycle() {
    let class = vector_class(Arc::default());
    assert!(class.lifecycle().destruct.is_none());

    let mut x = 1.5f32;
    let mut y = -2.0f32;
    let mut original = class
        .create_with(&mut [ValueSlot::new(&mut x), ValueSlot::new(&mut y)])
        .unwrap();
    assert!(original.is_valid());

    unsafe {
        assert_eq!(original.downcast_ref::<Vector>(), Some(&Vector { x: 1.5, y: -2.0 }));

        let mut copy = class.clone_object(&original);
        assert_eq!(class.equals(&original, &copy), Some(true));
        assert_eq!(class.hash(&original), class.hash(&copy));

        let mut this = copy.as_slot().unwrap();
        let mut by = 2.0f32;
        assert!(class
            .find_method("Scale")
            .unwrap()
            .call(&mut [this.reborrow(), ValueSlot::new(&mut by)], None));
        drop(this);
        assert_eq!(class.equals(&original, &copy), Some(false));

        let mut moved = class.move_object(&mut original);
        assert!(!original.is_valid());
        assert_eq!(moved.downcast_ref::<Vector>().unwrap().x, 1.5);

        class.destroy(&mut copy);
        class.destroy(&mut moved);
        assert!(!copy.is_valid());
    }

    let scoped = class.create_scoped().unwrap();
    assert_eq!(scoped.get::<Vector>(), Some(&Vector::default()));
}

#[derive(Default)]
struct ClassJournal {
    added: Vec<String>,
    removed_methods: usize,
}

impl ContextEvents for ClassJournal {
    fn on_add_class(&mut self, class: &Class) {
        self.added.push(class.name().to_string());
    }

    fn on_remove_method(&mut self, _method: &Method) {
        self.removed_methods += 1;
    }
}

#[test]
fn test_unregister_class_notifies_members() {
    init_logging();
    let mut registry = ContextRegistry::new();
    let journal = Arc::new(Mutex::new(ClassJournal::default()));
    registry
        .observers()
        .connect(journal.clone() as SharedHandler<ContextObservers>)
        .unwrap();

    registry.register_class(vector_class(Arc::default())).unwrap();
    registry
        .register_class(Class::builder::<Color>("Color").default_constructible().build())
        .unwrap();
    assert_eq!(journal.lock().added, vec!["Vector", "Color"]);

    registry.unregister_class("Vector").unwrap();
    assert_eq!(journal.lock().removed_methods, 2);
    assert!(registry.find_class_of::<Vector>().is_none());
    assert!(registry.find_class_of::<Color>().is_some());

    registry.clear();
    assert!(registry.classes().next().is_none());
}
