//! Class descriptors
//!
//! One [`Class`] per reflected native type: its lifecycle operations, the
//! methods and properties it owns, and bookkeeping such as wrapped types and
//! the buses it talks to.
//!
//! Lifecycle operations are selected when the class is built, from the
//! capabilities the builder opts into. Absent capabilities leave the slot
//! empty and the matching operation becomes a no-op returning `None` or an
//! invalid [`Object`].

use std::alloc::{self, Layout};
use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use void_core::{hash_fn, HashFn, Reflect, TypeInfo};

use crate::attribute::AttributeMap;
use crate::error::{ReflectError, Result};
use crate::method::Method;
use crate::parameter::ParamInfo;
use crate::property::{Property, PropertyOwner};
use crate::signature::{IntoFunction, IntoMethod};
use crate::slot::ValueSlot;

/// Erased lifecycle operations of one type
#[derive(Clone, Copy, Default)]
pub struct Lifecycle {
    pub construct: Option<unsafe fn(NonNull<u8>)>,
    /// `(source, destination)`
    pub clone: Option<unsafe fn(NonNull<u8>, NonNull<u8>)>,
    pub hash: Option<HashFn>,
    pub eq: Option<unsafe fn(NonNull<u8>, NonNull<u8>) -> bool>,
    /// Only set for types that need drop
    pub destruct: Option<unsafe fn(NonNull<u8>)>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("construct", &self.construct.is_some())
            .field("clone", &self.clone.is_some())
            .field("hash", &self.hash.is_some())
            .field("eq", &self.eq.is_some())
            .field("destruct", &self.destruct.is_some())
            .finish()
    }
}

unsafe fn construct_default<T: Default>(ptr: NonNull<u8>) {
    ptr.cast::<T>().as_ptr().write(T::default());
}

unsafe fn clone_into<T: Clone>(source: NonNull<u8>, destination: NonNull<u8>) {
    let value = source.cast::<T>().as_ref().clone();
    destination.cast::<T>().as_ptr().write(value);
}

unsafe fn equals<T: PartialEq>(a: NonNull<u8>, b: NonNull<u8>) -> bool {
    a.cast::<T>().as_ref() == b.cast::<T>().as_ref()
}

unsafe fn destruct<T>(ptr: NonNull<u8>) {
    ptr::drop_in_place(ptr.cast::<T>().as_ptr());
}

/// Handle to a class-managed instance
#[derive(Clone, Copy, Debug)]
pub struct Object {
    address: Option<NonNull<u8>>,
    type_info: TypeInfo,
}

impl Object {
    /// Handle that refers to nothing
    pub fn invalid(type_info: TypeInfo) -> Self {
        Self {
            address: None,
            type_info,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.address.is_some()
    }

    pub fn address(&self) -> Option<NonNull<u8>> {
        self.address
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// Bind a slot to the instance.
    ///
    /// # Safety
    ///
    /// The instance must stay alive and unaliased for `'a`.
    pub unsafe fn as_slot<'a>(&self) -> Option<ValueSlot<'a>> {
        self.address
            .map(|address| ValueSlot::from_raw(address, ParamInfo::from_type_info(self.type_info)))
    }

    /// Borrow the instance as a `T`.
    ///
    /// # Safety
    ///
    /// The instance must be alive for the returned borrow.
    pub unsafe fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.type_info.type_id != TypeId::of::<T>() {
            return None;
        }
        self.address.map(|address| address.cast::<T>().as_ref())
    }
}

type UnwrapFn = Box<dyn Fn(NonNull<u8>) -> NonNull<u8> + Send + Sync>;

struct Wrapped {
    type_info: TypeInfo,
    unwrap: UnwrapFn,
}

/// A reflected type
pub struct Class {
    name: String,
    type_info: TypeInfo,
    base_types: Vec<TypeId>,
    lifecycle: Lifecycle,
    constructor: Option<Method>,
    methods: HashMap<String, Method>,
    properties: HashMap<String, Property>,
    wrapped: Option<Wrapped>,
    request_buses: Vec<String>,
    notification_buses: Vec<String>,
    attributes: AttributeMap,
}

impl Class {
    /// Start describing `T`
    pub fn builder<T: Reflect>(name: impl Into<String>) -> ClassBuilder<T> {
        ClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn type_id(&self) -> TypeId {
        self.type_info.type_id
    }

    pub fn size(&self) -> usize {
        self.type_info.size
    }

    pub fn alignment(&self) -> usize {
        self.type_info.align
    }

    /// Transitive base type ids
    pub fn base_types(&self) -> &[TypeId] {
        &self.base_types
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn request_buses(&self) -> &[String] {
        &self.request_buses
    }

    pub fn notification_buses(&self) -> &[String] {
        &self.notification_buses
    }

    /// Whether this type is `type_id` or derives from it
    pub fn is_type_of(&self, type_id: TypeId) -> bool {
        self.type_info.is_type_of(type_id)
    }

    // ========== Members ==========

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn constructor(&self) -> Option<&Method> {
        self.constructor.as_ref()
    }

    /// Find a method by name, falling back to deprecated names
    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name).or_else(|| {
            self.methods
                .values()
                .find(|m| m.deprecated_name() == Some(name))
        })
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn find_getter(&self, property: &str) -> Option<&Method> {
        self.find_property(property)?.getter()
    }

    pub fn find_setter(&self, property: &str) -> Option<&Method> {
        self.find_property(property)?.setter()
    }

    pub fn is_method_overloaded(&self, name: &str) -> bool {
        self.find_method(name).map_or(false, Method::is_overloaded)
    }

    pub(crate) fn take_members(&mut self) -> (Vec<Method>, Vec<Property>) {
        let methods = self
            .methods
            .drain()
            .flat_map(|(_, method)| method.into_overloads())
            .collect();
        let properties = self.properties.drain().map(|(_, p)| p).collect();
        (methods, properties)
    }

    // ========== Lifecycle ==========

    fn layout(&self) -> Option<Layout> {
        Layout::from_size_align(self.type_info.size, self.type_info.align).ok()
    }

    /// Allocate uninitialised storage for one instance
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        let layout = self.layout()?;
        if layout.size() == 0 {
            return NonNull::new(layout.align() as *mut u8);
        }
        // SAFETY: the layout has a non-zero size
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    /// Free storage from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `address` must come from this class's `allocate` and hold no live value.
    pub unsafe fn deallocate(&self, address: NonNull<u8>) {
        if let Some(layout) = self.layout() {
            if layout.size() != 0 {
                alloc::dealloc(address.as_ptr(), layout);
            }
        }
    }

    /// Allocate and default-construct. Invalid when the type is not default
    /// constructible.
    pub fn create(&self) -> Object {
        let Some(construct) = self.lifecycle.construct else {
            return Object::invalid(self.type_info);
        };
        let Some(address) = self.allocate() else {
            return Object::invalid(self.type_info);
        };
        // SAFETY: freshly allocated storage of the right layout
        unsafe { construct(address) };
        Object {
            address: Some(address),
            type_info: self.type_info,
        }
    }

    /// Default-construct in place. Returns false when unsupported.
    ///
    /// # Safety
    ///
    /// `address` must be valid for writes of this type and hold no live value.
    pub unsafe fn create_at(&self, address: NonNull<u8>) -> bool {
        match self.lifecycle.construct {
            Some(construct) => {
                construct(address);
                true
            }
            None => false,
        }
    }

    /// Construct with the first constructor overload accepting `args`
    pub fn create_with(&self, args: &mut [ValueSlot<'_>]) -> Result<Object> {
        let constructor = self
            .constructor
            .as_ref()
            .ok_or_else(|| ReflectError::not_found("constructor", &self.name))?;
        let selected = constructor.select_overload(args).unwrap_or(constructor);
        let mut value = ValueSlot::typed(ParamInfo::from_type_info(self.type_info));
        selected.try_call(args, Some(&mut value))?;

        let address = self.allocate().ok_or_else(|| ReflectError::not_found("memory", &self.name))?;
        // SAFETY: fresh storage sized for the constructed type
        match unsafe { value.move_owned_to(address) } {
            Some(_) => Ok(Object {
                address: Some(address),
                type_info: self.type_info,
            }),
            None => {
                // SAFETY: nothing was written into `address`
                unsafe { self.deallocate(address) };
                Err(ReflectError::TypeConversionFailure {
                    method: selected.name().to_string(),
                    position: "result".into(),
                    expected: self.type_info.name.into(),
                    found: "nothing".into(),
                })
            }
        }
    }

    /// Create an instance destroyed when the guard drops
    pub fn create_scoped(&self) -> Option<ScopedObject<'_>> {
        let object = self.create();
        object.is_valid().then_some(ScopedObject { class: self, object })
    }

    /// Copy-construct a new instance from `object`
    ///
    /// # Safety
    ///
    /// `object` must be a live instance of this class.
    pub unsafe fn clone_object(&self, object: &Object) -> Object {
        let (Some(clone), Some(source)) = (self.lifecycle.clone, object.address) else {
            return Object::invalid(self.type_info);
        };
        let Some(address) = self.allocate() else {
            return Object::invalid(self.type_info);
        };
        clone(source, address);
        Object {
            address: Some(address),
            type_info: self.type_info,
        }
    }

    /// Move `object` into new storage, invalidating the source handle
    ///
    /// # Safety
    ///
    /// `object` must be a live instance created by this class.
    pub unsafe fn move_object(&self, object: &mut Object) -> Object {
        let Some(source) = object.address else {
            return Object::invalid(self.type_info);
        };
        let Some(address) = self.allocate() else {
            return Object::invalid(self.type_info);
        };
        ptr::copy_nonoverlapping(source.as_ptr(), address.as_ptr(), self.type_info.size);
        self.deallocate(source);
        object.address = None;
        Object {
            address: Some(address),
            type_info: self.type_info,
        }
    }

    /// Destruct and free `object`, invalidating the handle
    ///
    /// # Safety
    ///
    /// `object` must be a live instance created by this class.
    pub unsafe fn destroy(&self, object: &mut Object) {
        if let Some(address) = object.address.take() {
            if let Some(destruct) = self.lifecycle.destruct {
                destruct(address);
            }
            self.deallocate(address);
        }
    }

    /// Hash an instance, `None` when the type is not hashable
    ///
    /// # Safety
    ///
    /// `object` must be a live instance of this class.
    pub unsafe fn hash(&self, object: &Object) -> Option<u64> {
        let address = object.address?;
        match self.lifecycle.hash {
            Some(hash) => {
                let mut hasher = DefaultHasher::new();
                hash(address, &mut hasher);
                Some(hasher.finish())
            }
            None => self.type_info.hash_u64(address),
        }
    }

    /// Compare two instances, `None` when the type is not comparable
    ///
    /// # Safety
    ///
    /// Both objects must be live instances of this class.
    pub unsafe fn equals(&self, a: &Object, b: &Object) -> Option<bool> {
        let eq = self.lifecycle.eq?;
        Some(eq(a.address?, b.address?))
    }

    /// Type wrapped by this class, if it is a wrapper
    pub fn wrapped_type(&self) -> Option<&TypeInfo> {
        self.wrapped.as_ref().map(|w| &w.type_info)
    }

    /// The inner object of a wrapper instance
    ///
    /// # Safety
    ///
    /// `object` must be a live instance of this class; the result borrows it.
    pub unsafe fn unwrap(&self, object: &Object) -> Option<Object> {
        let wrapped = self.wrapped.as_ref()?;
        let address = object.address?;
        Some(Object {
            address: Some((wrapped.unwrap)(address)),
            type_info: wrapped.type_info,
        })
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("type", &self.type_info.name)
            .field("lifecycle", &self.lifecycle)
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .finish()
    }
}

/// Instance destroyed on drop
pub struct ScopedObject<'c> {
    class: &'c Class,
    object: Object,
}

impl ScopedObject<'_> {
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Slot bound to the instance
    pub fn slot(&mut self) -> Option<ValueSlot<'_>> {
        // SAFETY: the guard keeps the instance alive and the slot borrows it
        unsafe { self.object.as_slot() }
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        // SAFETY: alive until the guard drops
        unsafe { self.object.downcast_ref() }
    }
}

impl Drop for ScopedObject<'_> {
    fn drop(&mut self) {
        // SAFETY: created by `class` and not destroyed elsewhere
        unsafe { self.class.destroy(&mut self.object) };
    }
}

/// Builds a [`Class`] for `T`
pub struct ClassBuilder<T> {
    class: Class,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Reflect> ClassBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let type_info = TypeInfo::of::<T>();
        let lifecycle = Lifecycle {
            destruct: type_info.needs_drop.then_some(destruct::<T> as unsafe fn(NonNull<u8>)),
            hash: T::hasher(),
            ..Lifecycle::default()
        };
        Self {
            class: Class {
                name: name.into(),
                type_info,
                base_types: type_info.base_type_ids(),
                lifecycle,
                constructor: None,
                methods: HashMap::new(),
                properties: HashMap::new(),
                wrapped: None,
                request_buses: Vec::new(),
                notification_buses: Vec::new(),
                attributes: AttributeMap::new(),
            },
            _marker: PhantomData,
        }
    }

    pub fn default_constructible(mut self) -> Self
    where
        T: Default,
    {
        self.class.lifecycle.construct = Some(construct_default::<T>);
        self
    }

    pub fn cloneable(mut self) -> Self
    where
        T: Clone,
    {
        self.class.lifecycle.clone = Some(clone_into::<T>);
        self
    }

    pub fn hashable(mut self) -> Self
    where
        T: Hash,
    {
        self.class.lifecycle.hash = Some(hash_fn::<T>());
        self
    }

    pub fn comparable(mut self) -> Self
    where
        T: PartialEq,
    {
        self.class.lifecycle.eq = Some(equals::<T>);
        self
    }

    /// Add a constructor; it must return `T`
    pub fn constructor<M, F: IntoFunction<M>>(mut self, f: F) -> Result<Self> {
        let name = format!("{}::{}", self.class.name, self.class.name);
        let method = Method::from_fn(name, f);
        if !method.result().is_type::<T>() {
            return Err(ReflectError::signature(
                method.name(),
                format!("constructor returns {}", method.result().name()),
            ));
        }
        match &mut self.class.constructor {
            Some(existing) => existing.add_overload(method)?,
            None => self.class.constructor = Some(method),
        }
        Ok(self)
    }

    /// Add a member function taking `&C` or `&mut C` first, where `T` is `C`
    /// or derives from it
    pub fn method<C, M, F: IntoMethod<C, M>>(self, name: &str, f: F) -> Result<Self>
    where
        C: Reflect,
    {
        if !self.class.type_info.is_type_of(TypeId::of::<C>()) {
            return Err(ReflectError::signature(
                name,
                format!("receiver {} is not a base of {}", C::type_name(), self.class.name),
            ));
        }
        self.add_method(Method::from_method(name, f))
    }

    /// Add a class-scoped function without a receiver
    pub fn function<M, F: IntoFunction<M>>(self, name: &str, f: F) -> Result<Self> {
        self.add_method(Method::from_fn(name, f))
    }

    /// Add a prepared method (defaults, argument names, overloads)
    pub fn add_method(mut self, mut method: Method) -> Result<Self> {
        if let Some(this) = method.this_argument().and_then(ParamInfo::type_id) {
            if !self.class.type_info.is_type_of(this) {
                return Err(ReflectError::signature(
                    method.name(),
                    format!("receiver is not a base of {}", self.class.name),
                ));
            }
        }
        if let Some(deprecated) = method.deprecated_name() {
            let methods = &self.class.methods;
            let collides = methods.contains_key(deprecated)
                || methods
                    .values()
                    .any(|m| m.name() != method.name() && m.deprecated_name() == Some(deprecated));
            if collides {
                log::warn!(
                    "Deprecated name '{}' of {}::{} is already in use; dropped",
                    deprecated,
                    self.class.name,
                    method.name()
                );
                method.clear_deprecated_name();
            }
        }
        match self.class.methods.get_mut(method.name()) {
            Some(existing) => existing.add_overload(method)?,
            None => {
                self.class.methods.insert(method.name().to_string(), method);
            }
        }
        Ok(self)
    }

    /// Add a read/write member property
    pub fn property<C, GM, SM, G, S>(self, name: &str, getter: G, setter: S) -> Result<Self>
    where
        G: IntoMethod<C, GM>,
        S: IntoMethod<C, SM>,
    {
        self.add_property(
            name,
            Some(Method::from_method(name, getter)),
            Some(Method::from_method(name, setter)),
        )
    }

    /// Add a read-only member property
    pub fn property_readonly<C, GM, G>(self, name: &str, getter: G) -> Result<Self>
    where
        G: IntoMethod<C, GM>,
    {
        self.add_property(name, Some(Method::from_method(name, getter)), None)
    }

    /// Add a class constant
    pub fn constant<V: Reflect + Clone>(self, name: &str, value: V) -> Result<Self> {
        self.add_property(name, Some(Method::from_fn(name, move || value.clone())), None)
    }

    /// Add a property from prepared accessors
    pub fn add_property(
        mut self,
        name: &str,
        getter: Option<Method>,
        setter: Option<Method>,
    ) -> Result<Self> {
        if self.class.properties.contains_key(name) {
            return Err(ReflectError::conflict("property", format!("{}::{}", self.class.name, name)));
        }
        let owner = PropertyOwner {
            name: &self.class.name,
            type_info: &self.class.type_info,
        };
        let property = Property::bind_member(owner, name, getter, setter)?;
        self.class.properties.insert(name.to_string(), property);
        Ok(self)
    }

    /// Mark `T` as a wrapper around `W` (smart pointer, handle, ...)
    pub fn wrapping<W: Reflect>(mut self, unwrap: fn(&T) -> &W) -> Self {
        self.class.wrapped = Some(Wrapped {
            type_info: TypeInfo::of::<W>(),
            unwrap: Box::new(move |address| {
                // SAFETY: `Class::unwrap` only passes live instances of `T`
                let outer = unsafe { address.cast::<T>().as_ref() };
                NonNull::from(unwrap(outer)).cast()
            }),
        });
        self
    }

    /// Name a bus this type sends requests on
    pub fn request_bus(mut self, bus: impl Into<String>) -> Self {
        self.class.request_buses.push(bus.into());
        self
    }

    /// Name a bus this type listens to
    pub fn notification_bus(mut self, bus: impl Into<String>) -> Self {
        self.class.notification_buses.push(bus.into());
        self
    }

    pub fn attribute<V: Any + Send + Sync>(mut self, key: &str, value: V) -> Self {
        self.class.attributes.insert(key, value);
        self
    }

    pub fn build(self) -> Class {
        self.class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Debug, Default, PartialEq, Hash)]
    struct Tag {
        label: String,
    }

    impl Reflect for Tag {
        fn type_name() -> &'static str {
            "Tag"
        }
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Point {
        x: f32,
        y: f32,
    }

    impl Reflect for Point {
        fn type_name() -> &'static str {
            "Point"
        }
    }

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Noisy;

    impl Reflect for Noisy {}

    impl Drop for Noisy {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Handle {
        inner: Arc<Point>,
    }

    impl Reflect for Handle {}

    #[test]
    fn test_lifecycle_selection() {
        let plain = Class::builder::<Point>("Point").build();
        assert!(plain.lifecycle().construct.is_none());
        // Plain old data needs no destructor
        assert!(plain.lifecycle().destruct.is_none());
        assert!(!plain.create().is_valid());
        assert!(plain.create_scoped().is_none());

        let tag = Class::builder::<Tag>("Tag")
            .default_constructible()
            .cloneable()
            .hashable()
            .comparable()
            .build();
        assert!(tag.lifecycle().destruct.is_some());
        assert!(tag.lifecycle().clone.is_some());
    }

    #[test]
    fn test_create_clone_destroy() {
        let class = Class::builder::<Tag>("Tag")
            .default_constructible()
            .cloneable()
            .hashable()
            .comparable()
            .build();
        let mut original = class.create();
        assert!(original.is_valid());
        unsafe {
            original.address().unwrap().cast::<Tag>().as_mut().label = "hero".into();
            let mut copy = class.clone_object(&original);
            assert_eq!(copy.downcast_ref::<Tag>().unwrap().label, "hero");
            assert_eq!(class.equals(&original, &copy), Some(true));
            assert_eq!(class.hash(&original), class.hash(&copy));

            let mut moved = class.move_object(&mut original);
            assert!(!original.is_valid());
            assert_eq!(moved.downcast_ref::<Tag>().unwrap().label, "hero");

            class.destroy(&mut copy);
            class.destroy(&mut moved);
            assert!(!moved.is_valid());
        }
    }

    #[test]
    fn test_scoped_object_drops() {
        let class = Class::builder::<Noisy>("Noisy").default_constructible().build();
        let before = DROPS.load(Ordering::SeqCst);
        {
            let scoped = class.create_scoped().unwrap();
            assert!(scoped.get::<Noisy>().is_some());
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_constructor_overloads() {
        let class = Class::builder::<Point>("Point")
            .constructor(|x: f32, y: f32| Point { x, y })
            .unwrap()
            .constructor(|v: f32| Point { x: v, y: v })
            .unwrap()
            .build();
        let (mut x, mut y) = (1.0f32, 2.0f32);
        let mut object = class
            .create_with(&mut [ValueSlot::new(&mut x), ValueSlot::new(&mut y)])
            .unwrap();
        unsafe {
            assert_eq!(object.downcast_ref::<Point>(), Some(&Point { x: 1.0, y: 2.0 }));
            class.destroy(&mut object);
        }
        let mut single = class.create_with(&mut [ValueSlot::new(&mut x)]).unwrap();
        unsafe {
            assert_eq!(single.downcast_ref::<Point>(), Some(&Point { x: 1.0, y: 1.0 }));
            class.destroy(&mut single);
        }

        assert!(Class::builder::<Point>("Point").constructor(|| 1i32).is_err());
    }

    #[test]
    fn test_members_and_lookup() {
        let class = Class::builder::<Point>("Point")
            .method("Length", |p: &Point| (p.x * p.x + p.y * p.y).sqrt())
            .unwrap()
            .method("Scale", |p: &mut Point, by: f32| {
                p.x *= by;
                p.y *= by;
            })
            .unwrap()
            .method("Scale", |p: &mut Point, x: f32, y: f32| {
                p.x *= x;
                p.y *= y;
            })
            .unwrap()
            .property("X", |p: &Point| p.x, |p: &mut Point, v: f32| p.x = v)
            .unwrap()
            .constant("Dimensions", 2u32)
            .unwrap()
            .function("Origin", Point::default)
            .unwrap()
            .build();

        assert!(class.find_method("Length").is_some());
        assert!(class.is_method_overloaded("Scale"));
        assert!(!class.is_method_overloaded("Length"));
        assert_eq!(class.find_getter("X").unwrap().name(), "Point::X::Getter");
        assert!(class.find_setter("Dimensions").is_none());

        let mut point = Point { x: 3.0, y: 4.0 };
        let mut result = ValueSlot::untyped();
        assert!(class
            .find_method("Length")
            .unwrap()
            .call(&mut [ValueSlot::new(&mut point)], Some(&mut result)));
        assert_eq!(result.get::<f32>(), Some(&5.0));

        // Receiver type unrelated to the class
        assert!(Class::builder::<Point>("Point")
            .method("Len", |s: &String| s.len())
            .is_err());
    }

    #[test]
    fn test_deprecated_method_names_stay_unique() {
        let class = Class::builder::<Point>("Point")
            .add_method(
                Method::from_method("Length", |p: &Point| (p.x * p.x + p.y * p.y).sqrt())
                    .with_deprecated_name("Magnitude"),
            )
            .unwrap()
            .add_method(
                Method::from_method("Norm", |p: &Point| p.x.abs() + p.y.abs())
                    .with_deprecated_name("Magnitude"),
            )
            .unwrap()
            .add_method(Method::from_method("Sum", |p: &Point| p.x + p.y).with_deprecated_name("Length"))
            .unwrap()
            .build();

        assert_eq!(class.find_method("Magnitude").unwrap().name(), "Length");
        assert!(class.find_method("Norm").unwrap().deprecated_name().is_none());
        assert!(class.find_method("Sum").unwrap().deprecated_name().is_none());
        assert_eq!(class.find_method("Length").unwrap().name(), "Length");
    }

    #[test]
    fn test_wrapping() {
        let class = Class::builder::<Handle>("Handle")
            .wrapping(|h: &Handle| h.inner.as_ref())
            .build();
        assert_eq!(class.wrapped_type().map(|t| t.type_id), Some(TypeId::of::<Point>()));

        let mut handle = Handle {
            inner: Arc::new(Point { x: 7.0, y: 0.0 }),
        };
        let object = Object {
            address: Some(NonNull::from(&mut handle).cast()),
            type_info: TypeInfo::of::<Handle>(),
        };
        let inner = unsafe { class.unwrap(&object) }.unwrap();
        assert_eq!(unsafe { inner.downcast_ref::<Point>() }.map(|p| p.x), Some(7.0));
    }
}
