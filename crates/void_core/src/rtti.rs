//! Runtime type information for reflected types
//!
//! Every type that crosses the reflection boundary implements [`Reflect`].
//! From it a copyable [`TypeInfo`] is derived which supplies stable identity,
//! layout, the statically-related base types used for pointer casting, the
//! integral representation of enumerations and an optional value hasher.
//!
//! Rust has no inheritance, so a "base" is modelled as an embedded field:
//! the derived type lists a [`BaseType`] whose upcast function projects a
//! pointer to the derived value onto the field holding the base value.

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ptr::NonNull;
use alloc::string::String;
use alloc::vec::Vec;

/// Erased hashing function: feeds the value at the address into the hasher.
pub type HashFn = unsafe fn(NonNull<u8>, &mut dyn Hasher);

/// Erased upcast function: maps the address of a derived value to the address
/// of its embedded base value.
pub type UpcastFn = unsafe fn(NonNull<u8>) -> NonNull<u8>;

/// A type that can be described to the reflection system
pub trait Reflect: Send + Sync + Sized + 'static {
    /// Human-readable name used in diagnostics and registry lookups
    fn type_name() -> &'static str {
        core::any::type_name::<Self>()
    }

    /// Statically-related base types, in declaration order
    fn bases() -> &'static [BaseType] {
        &[]
    }

    /// Integral representation of a fieldless enumeration
    fn underlying() -> Option<Underlying> {
        None
    }

    /// Hashing capability
    fn hasher() -> Option<HashFn> {
        None
    }
}

/// Build a [`HashFn`] for a hashable type
pub fn hash_fn<T: Hash + 'static>() -> HashFn {
    unsafe fn hash_erased<T: Hash>(ptr: NonNull<u8>, mut state: &mut dyn Hasher) {
        ptr.cast::<T>().as_ref().hash(&mut state);
    }
    hash_erased::<T>
}

/// Link from a derived type to one of its base types
#[derive(Clone, Copy)]
pub struct BaseType {
    info: fn() -> TypeInfo,
    upcast: UpcastFn,
}

impl BaseType {
    /// Describe a base type.
    ///
    /// Prefer the [`base_type!`](crate::base_type) macro, which derives the
    /// upcast from a field projection.
    ///
    /// # Safety
    ///
    /// `upcast` must map any valid pointer to the derived type to a valid,
    /// properly aligned pointer to a live value of the base type that lives
    /// at least as long as the derived value.
    pub const unsafe fn new(info: fn() -> TypeInfo, upcast: UpcastFn) -> Self {
        Self { info, upcast }
    }

    /// Type information of the base
    pub fn info(&self) -> TypeInfo {
        (self.info)()
    }

    /// Project a derived pointer onto the base.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live value of the derived type this entry
    /// belongs to.
    pub unsafe fn upcast(&self, ptr: NonNull<u8>) -> NonNull<u8> {
        (self.upcast)(ptr)
    }
}

impl fmt::Debug for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BaseType").field(&self.info().name).finish()
    }
}

/// Build a [`BaseType`] entry for a base value embedded as a field.
///
/// ```ignore
/// impl Reflect for Sprite {
///     fn bases() -> &'static [BaseType] {
///         static BASES: [BaseType; 1] = [base_type!(Sprite => Node, node)];
///         &BASES
///     }
/// }
/// ```
#[macro_export]
macro_rules! base_type {
    ($derived:ty => $base:ty, $field:ident) => {
        unsafe {
            $crate::BaseType::new($crate::TypeInfo::of::<$base>, |ptr| {
                ::core::ptr::NonNull::new_unchecked(::core::ptr::addr_of_mut!(
                    (*ptr.cast::<$derived>().as_ptr()).$field
                ))
                .cast::<u8>()
            })
        }
    };
}

/// Integral representation of a fieldless enumeration
#[derive(Clone, Copy)]
pub struct Underlying {
    info: fn() -> TypeInfo,
}

impl Underlying {
    /// Declare that the enumeration is represented as `U`.
    ///
    /// # Safety
    ///
    /// The enumeration must be fieldless and declared `#[repr(U)]`, so that
    /// every value of it is also a valid `U` at the same address.
    pub const unsafe fn of<U: Reflect>() -> Self {
        Self { info: TypeInfo::of::<U> }
    }

    /// Type information of the representation
    pub fn info(&self) -> TypeInfo {
        (self.info)()
    }
}

/// Information about a reflected type
#[derive(Clone, Copy)]
pub struct TypeInfo {
    /// The Rust TypeId
    pub type_id: TypeId,
    /// Human-readable type name
    pub name: &'static str,
    /// Size in bytes
    pub size: usize,
    /// Alignment requirement
    pub align: usize,
    /// Whether this type needs drop
    pub needs_drop: bool,
    bases: &'static [BaseType],
    underlying: Option<Underlying>,
    hasher: Option<HashFn>,
}

impl TypeInfo {
    /// Create type info for a reflected type
    pub fn of<T: Reflect>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::type_name(),
            size: core::mem::size_of::<T>(),
            align: core::mem::align_of::<T>(),
            needs_drop: core::mem::needs_drop::<T>(),
            bases: T::bases(),
            underlying: T::underlying(),
            hasher: T::hasher(),
        }
    }

    /// Whether this is the void type `()`
    pub fn is_void(&self) -> bool {
        self.type_id == TypeId::of::<()>()
    }

    /// Direct bases
    pub fn bases(&self) -> &'static [BaseType] {
        self.bases
    }

    /// All transitive base type ids, depth-first, without duplicates
    pub fn base_type_ids(&self) -> Vec<TypeId> {
        let mut out = Vec::new();
        self.collect_bases(&mut out);
        out
    }

    fn collect_bases(&self, out: &mut Vec<TypeId>) {
        for base in self.bases {
            let info = base.info();
            if !out.contains(&info.type_id) {
                out.push(info.type_id);
            }
            info.collect_bases(out);
        }
    }

    /// Representation of an enumeration
    pub fn underlying(&self) -> Option<TypeInfo> {
        self.underlying.map(|u| u.info())
    }

    /// True when `candidate` is this type or one of its transitive bases
    pub fn is_type_of(&self, candidate: TypeId) -> bool {
        self.type_id == candidate
            || self
                .bases
                .iter()
                .any(|base| base.info().is_type_of(candidate))
    }

    /// Cast a pointer to a value of this type to a pointer to `target`.
    ///
    /// Succeeds for identity and for any transitive base. Returns the new
    /// address together with the target's type information.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live value of this type.
    pub unsafe fn cast(&self, ptr: NonNull<u8>, target: TypeId) -> Option<(NonNull<u8>, TypeInfo)> {
        if self.type_id == target {
            return Some((ptr, *self));
        }
        for base in self.bases {
            let info = base.info();
            if let Some(found) = info.cast(base.upcast(ptr), target) {
                return Some(found);
            }
        }
        None
    }

    /// Whether values of this type can be hashed
    pub fn is_hashable(&self) -> bool {
        self.hasher.is_some()
    }

    /// Feed the value at `ptr` into `state`. Returns false when the type is
    /// not hashable.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live value of this type.
    pub unsafe fn hash_value(&self, ptr: NonNull<u8>, state: &mut dyn Hasher) -> bool {
        match self.hasher {
            Some(hash) => {
                hash(ptr, state);
                true
            }
            None => false,
        }
    }

    /// Hash the value at `ptr` with the standard library's default hasher.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live value of this type.
    #[cfg(feature = "std")]
    pub unsafe fn hash_u64(&self, ptr: NonNull<u8>) -> Option<u64> {
        let mut state = std::collections::hash_map::DefaultHasher::new();
        self.hash_value(ptr, &mut state).then(|| state.finish())
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("needs_drop", &self.needs_drop)
            .field("bases", &self.bases.len())
            .finish()
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

macro_rules! impl_reflect_hashable {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn type_name() -> &'static str {
                    $name
                }

                fn hasher() -> Option<HashFn> {
                    Some(hash_fn::<$ty>())
                }
            }
        )*
    };
}

impl_reflect_hashable! {
    bool => "bool",
    char => "char",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    String => "String",
    &'static str => "str",
}

impl Reflect for () {
    fn type_name() -> &'static str {
        "void"
    }
}

impl Reflect for f32 {
    fn type_name() -> &'static str {
        "f32"
    }
}

impl Reflect for f64 {
    fn type_name() -> &'static str {
        "f64"
    }
}

impl<T: Reflect> Reflect for Option<T> {}

impl<T: Reflect> Reflect for Vec<T> {}
