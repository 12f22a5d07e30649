//! Parameter descriptors
//!
//! Immutable per-parameter metadata: the parameter's type, its trait bits
//! and, separately, the argument name, tooltip and default value a
//! registration may attach.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use void_core::{Reflect, TypeInfo};

use crate::slot::ValueSlot;

/// Parameter trait flags (bitflags-style)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ParamTraits(u32);

impl ParamTraits {
    /// Plain value
    pub const NONE: Self = Self(0);

    /// Passed by pointer
    pub const POINTER: Self = Self(1 << 0);

    /// Read-only
    pub const CONST: Self = Self(1 << 1);

    /// Passed by reference
    pub const REFERENCE: Self = Self(1 << 2);

    /// Receiver of a member call
    pub const THIS_PTR: Self = Self(1 << 3);

    /// Text value
    pub const STRING: Self = Self(1 << 4);

    /// First element of an array range
    pub const ARRAY_BEGIN: Self = Self(1 << 5);

    /// One past the last element of an array range
    pub const ARRAY_END: Self = Self(1 << 6);

    /// Element count of an array range
    pub const ARRAY_SIZE: Self = Self(1 << 7);

    /// Index into a container
    pub const INDEX: Self = Self(1 << 8);

    /// Create empty flags
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create from raw bits
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Check if empty
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check if contains flag
    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Insert a flag
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Remove a flag
    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Union of two flag sets
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Difference of two flag sets
    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl std::ops::BitOr for ParamTraits {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ParamTraits {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for ParamTraits {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Type and traits of one parameter (or of a result)
#[derive(Clone, Copy)]
pub struct ParamInfo {
    type_info: Option<TypeInfo>,
    traits: ParamTraits,
}

impl ParamInfo {
    /// Describe a parameter of type `T`
    pub fn of<T: Reflect>() -> Self {
        let type_id = TypeId::of::<T>();
        let traits = if type_id == TypeId::of::<String>() || type_id == TypeId::of::<&'static str>() {
            ParamTraits::STRING
        } else {
            ParamTraits::NONE
        };
        Self {
            type_info: Some(TypeInfo::of::<T>()),
            traits,
        }
    }

    /// Describe a parameter from existing type information
    pub fn from_type_info(type_info: TypeInfo) -> Self {
        Self {
            type_info: Some(type_info),
            traits: ParamTraits::NONE,
        }
    }

    /// The void result
    pub fn void() -> Self {
        Self::of::<()>()
    }

    /// A parameter without a type; accepts any value and adopts whatever is
    /// stored into it
    pub fn untyped() -> Self {
        Self {
            type_info: None,
            traits: ParamTraits::NONE,
        }
    }

    /// Replace the trait flags
    pub fn with_traits(mut self, traits: ParamTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Type information, `None` when untyped
    pub fn type_info(&self) -> Option<&TypeInfo> {
        self.type_info.as_ref()
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.type_info.map(|info| info.type_id)
    }

    pub fn traits(&self) -> ParamTraits {
        self.traits
    }

    pub(crate) fn traits_mut(&mut self) -> &mut ParamTraits {
        &mut self.traits
    }

    /// Type name, used in diagnostics
    pub fn name(&self) -> &'static str {
        self.type_info.map_or("untyped", |info| info.name)
    }

    /// Whether this describes the void type
    pub fn is_void(&self) -> bool {
        self.type_info.map_or(false, |info| info.is_void())
    }

    pub fn is_untyped(&self) -> bool {
        self.type_info.is_none()
    }

    pub fn is_type<T: 'static>(&self) -> bool {
        self.type_id() == Some(TypeId::of::<T>())
    }

    /// Same type identity, ignoring traits
    pub fn same_type(&self, other: &ParamInfo) -> bool {
        self.type_id() == other.type_id()
    }
}

impl PartialEq for ParamInfo {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other) && self.traits == other.traits
    }
}

impl fmt::Debug for ParamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamInfo")
            .field("type", &self.name())
            .field("traits", &self.traits)
            .finish()
    }
}

impl fmt::Display for ParamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.traits.contains(ParamTraits::CONST) {
            f.write_str("const ")?;
        }
        f.write_str(self.name())?;
        if self.traits.contains(ParamTraits::REFERENCE) {
            f.write_str("&")?;
        }
        if self.traits.contains(ParamTraits::POINTER) {
            f.write_str("*")?;
        }
        Ok(())
    }
}

/// A shared default argument value.
///
/// One instance may back the same argument across several overloads.
pub struct DefaultValue {
    param: ParamInfo,
    value: Box<dyn Any + Send + Sync>,
    to_slot: fn(&(dyn Any + Send + Sync)) -> Option<ValueSlot<'static>>,
}

impl DefaultValue {
    /// Store a default
    pub fn new<T: Reflect + Clone>(value: T) -> Arc<Self> {
        fn clone_into_slot<T: Reflect + Clone>(
            value: &(dyn Any + Send + Sync),
        ) -> Option<ValueSlot<'static>> {
            value
                .downcast_ref::<T>()
                .map(|value| ValueSlot::from_value(value.clone()))
        }

        Arc::new(Self {
            param: ParamInfo::of::<T>(),
            value: Box::new(value),
            to_slot: clone_into_slot::<T>,
        })
    }

    /// Type of the stored value
    pub fn param(&self) -> &ParamInfo {
        &self.param
    }

    /// Borrow the stored value
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// A fresh slot owning a copy of the value
    pub fn to_slot(&self) -> Option<ValueSlot<'static>> {
        (self.to_slot)(self.value.as_ref())
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultValue")
            .field("type", &self.param.name())
            .finish()
    }
}

/// Per-argument registration metadata
#[derive(Clone, Debug, Default)]
pub struct ParamMetadata {
    pub name: Option<String>,
    pub tooltip: Option<String>,
    pub default: Option<Arc<DefaultValue>>,
}

impl ParamMetadata {
    /// Metadata carrying only an argument name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn with_default(mut self, default: Arc<DefaultValue>) -> Self {
        self.default = Some(default);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traits_combine() {
        let mut traits = ParamTraits::CONST | ParamTraits::REFERENCE;
        assert!(traits.contains(ParamTraits::CONST));
        assert!(!traits.contains(ParamTraits::POINTER));
        traits.insert(ParamTraits::THIS_PTR);
        traits.remove(ParamTraits::CONST);
        assert_eq!(traits, ParamTraits::REFERENCE | ParamTraits::THIS_PTR);
        assert_eq!(traits.difference(ParamTraits::REFERENCE), ParamTraits::THIS_PTR);
        assert!(ParamTraits::empty().is_empty());
    }

    #[test]
    fn test_param_info_of() {
        let param = ParamInfo::of::<i32>();
        assert!(param.is_type::<i32>());
        assert_eq!(param.name(), "i32");
        assert!(param.traits().is_empty());

        assert!(ParamInfo::of::<String>().traits().contains(ParamTraits::STRING));
        assert!(ParamInfo::void().is_void());
        assert!(ParamInfo::untyped().is_untyped());
        assert!(!ParamInfo::untyped().is_void());
    }

    #[test]
    fn test_param_display() {
        let param = ParamInfo::of::<f32>().with_traits(ParamTraits::CONST | ParamTraits::REFERENCE);
        assert_eq!(param.to_string(), "const f32&");
    }

    #[test]
    fn test_default_value_shared() {
        let default = DefaultValue::new(10i32);
        let shared = Arc::clone(&default);
        assert_eq!(default.get::<i32>(), Some(&10));
        assert!(default.get::<u32>().is_none());

        let slot = shared.to_slot().unwrap();
        assert_eq!(slot.get::<i32>(), Some(&10));
        assert!(default.param().is_type::<i32>());
    }
}
