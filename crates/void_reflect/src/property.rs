//! Property descriptors
//!
//! A property pairs an optional getter with an optional setter. Both sides
//! are validated together when the property is bound; a mismatch discards
//! both.

use std::any::TypeId;
use std::fmt;

use void_core::{Reflect, TypeInfo};

use crate::attribute::AttributeMap;
use crate::error::{ReflectError, Result};
use crate::method::Method;
use crate::parameter::{ParamInfo, ParamTraits};
use crate::signature::SlotArray;
use crate::slot::ValueSlot;

/// Class a member property belongs to
#[derive(Clone, Copy, Debug)]
pub struct PropertyOwner<'a> {
    pub name: &'a str,
    pub type_info: &'a TypeInfo,
}

/// A reflected property
pub struct Property {
    name: String,
    getter: Option<Method>,
    setter: Option<Method>,
    value: ParamInfo,
    attributes: AttributeMap,
}

impl Property {
    /// Bind a free (global) property
    pub fn bind(name: impl Into<String>, getter: Option<Method>, setter: Option<Method>) -> Result<Self> {
        Self::bind_in(None, name.into(), getter, setter)
    }

    /// Bind a property of `owner`; member accessors take the receiver first
    pub fn bind_member(
        owner: PropertyOwner<'_>,
        name: impl Into<String>,
        getter: Option<Method>,
        setter: Option<Method>,
    ) -> Result<Self> {
        Self::bind_in(Some(owner), name.into(), getter, setter)
    }

    fn bind_in(
        owner: Option<PropertyOwner<'_>>,
        name: String,
        mut getter: Option<Method>,
        mut setter: Option<Method>,
    ) -> Result<Self> {
        let qualified = match owner {
            Some(owner) => format!("{}::{}", owner.name, name),
            None => name.clone(),
        };
        if let Some(getter) = &mut getter {
            check_accessor(&qualified, "getter", getter, owner, 0)?;
            if !getter.has_result() {
                return Err(ReflectError::signature(&qualified, "getter must return a value"));
            }
            getter.set_name(format!("{}::Getter", qualified));
        }
        if let Some(setter) = &mut setter {
            check_accessor(&qualified, "setter", setter, owner, 1)?;
            setter.set_name(format!("{}::Setter", qualified));
        }

        let value = match (&getter, &setter) {
            (Some(getter), Some(setter)) => {
                let value = setter_value(setter);
                if !getter.result().same_type(value) {
                    return Err(ReflectError::signature(
                        &qualified,
                        format!(
                            "getter returns {} but setter takes {}",
                            getter.result().name(),
                            value.name()
                        ),
                    ));
                }
                *getter.result()
            }
            (Some(getter), None) => *getter.result(),
            (None, Some(setter)) => *setter_value(setter),
            (None, None) => {
                return Err(ReflectError::signature(&qualified, "property has no getter or setter"))
            }
        };

        log::debug!("Bound property '{}'", qualified);
        Ok(Self {
            name,
            getter,
            setter,
            value,
            attributes: AttributeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn getter(&self) -> Option<&Method> {
        self.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&Method> {
        self.setter.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    pub fn is_member(&self) -> bool {
        self.getter
            .as_ref()
            .or(self.setter.as_ref())
            .map_or(false, Method::is_member)
    }

    /// Value type of the property
    pub fn value_param(&self) -> &ParamInfo {
        &self.value
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.value_param().type_id()
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }

    /// Read the property into `result`. Member properties need `this`.
    pub fn get(&self, this: Option<&mut ValueSlot<'_>>, result: &mut ValueSlot<'_>) -> Result<()> {
        let getter = self
            .getter
            .as_ref()
            .ok_or_else(|| ReflectError::not_found("getter", &self.name))?;
        let mut args: SlotArray<'_> = this.map(|slot| slot.reborrow()).into_iter().collect();
        getter.try_call(&mut args, Some(result))
    }

    /// Write `value`. Member properties need `this`.
    pub fn set(&self, this: Option<&mut ValueSlot<'_>>, value: &mut ValueSlot<'_>) -> Result<()> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| ReflectError::not_found("setter", &self.name))?;
        let mut args: SlotArray<'_> = this.map(|slot| slot.reborrow()).into_iter().collect();
        args.push(value.reborrow());
        setter.try_call(&mut args, None)
    }

    /// Typed read
    pub fn get_value<T: Reflect>(&self, this: Option<&mut ValueSlot<'_>>) -> Result<T> {
        let mut result = ValueSlot::result_of::<T>();
        self.get(this, &mut result)?;
        result.take::<T>().ok_or_else(|| ReflectError::TypeConversionFailure {
            method: format!("{}::Getter", self.name),
            position: "result".into(),
            expected: T::type_name().into(),
            found: self.value_param().name().into(),
        })
    }
}

/// Validate one accessor's shape; `values` is the number of value arguments
/// it takes besides any receiver
fn check_accessor(
    property: &str,
    role: &str,
    accessor: &mut Method,
    owner: Option<PropertyOwner<'_>>,
    values: usize,
) -> Result<()> {
    if accessor.is_member() {
        let Some(owner) = owner else {
            return Err(ReflectError::signature(
                property,
                format!("{} takes a this pointer but the property is global", role),
            ));
        };
        let accepts_owner = accessor
            .this_argument()
            .and_then(ParamInfo::type_id)
            .map_or(false, |this| owner.type_info.is_type_of(this));
        if !accepts_owner {
            return Err(ReflectError::signature(
                property,
                format!("{} this pointer is not a {}", role, owner.name),
            ));
        }
        accessor.override_parameter_traits(1, ParamTraits::THIS_PTR, ParamTraits::NONE);
    }
    let expected = values + usize::from(accessor.is_member());
    if accessor.num_arguments() != expected {
        return Err(ReflectError::signature(
            property,
            format!(
                "{} takes {} argument(s), expected {}",
                role,
                accessor.num_arguments(),
                expected
            ),
        ));
    }
    Ok(())
}

fn setter_value(setter: &Method) -> &ParamInfo {
    &setter.arguments()[setter.num_arguments() - 1]
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("type", &self.value_param().name())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Light {
        intensity: f32,
    }

    impl Reflect for Light {
        fn type_name() -> &'static str {
            "Light"
        }
    }

    fn owner(info: &TypeInfo) -> PropertyOwner<'_> {
        PropertyOwner {
            name: "Light",
            type_info: info,
        }
    }

    #[test]
    fn test_member_property_roundtrip() {
        let info = TypeInfo::of::<Light>();
        let property = Property::bind_member(
            owner(&info),
            "Intensity",
            Some(Method::from_method("get", |l: &Light| l.intensity)),
            Some(Method::from_method("set", |l: &mut Light, v: f32| l.intensity = v)),
        )
        .unwrap();
        assert_eq!(property.getter().unwrap().name(), "Light::Intensity::Getter");
        assert_eq!(property.setter().unwrap().name(), "Light::Intensity::Setter");
        assert!(property.is_member());

        let mut light = Light { intensity: 1.0 };
        let mut value = 4.5f32;
        {
            let mut this = ValueSlot::new(&mut light);
            property
                .set(Some(&mut this), &mut ValueSlot::new(&mut value))
                .unwrap();
            assert_eq!(property.get_value::<f32>(Some(&mut this)).unwrap(), 4.5);
        }
        assert_eq!(light.intensity, 4.5);
    }

    #[test]
    fn test_mismatched_types_rejected() {
        let err = Property::bind(
            "Volume",
            Some(Method::from_fn("get", || 3i32)),
            Some(Method::from_fn("set", |_v: f32| {})),
        )
        .unwrap_err();
        assert!(matches!(err, ReflectError::SignatureMismatch { .. }));
    }

    #[test]
    fn test_accessor_shapes() {
        // Getter must return a value
        assert!(Property::bind("A", Some(Method::from_fn("get", || {})), None).is_err());
        // Free setter takes exactly one value
        assert!(Property::bind("B", None, Some(Method::from_fn("set", |_a: i32, _b: i32| {}))).is_err());
        // Member accessor on a global property
        assert!(Property::bind("C", Some(Method::from_method("get", |l: &Light| l.intensity)), None).is_err());
        // Receiver of another type
        let info = TypeInfo::of::<Light>();
        assert!(Property::bind_member(
            owner(&info),
            "D",
            Some(Method::from_method("get", |s: &String| s.len())),
            None
        )
        .is_err());
        assert!(Property::bind("E", None, None).is_err());
    }

    #[test]
    fn test_read_only_property() {
        let property = Property::bind("Pi", Some(Method::from_fn("pi", || 2.5f64)), None).unwrap();
        assert!(property.is_read_only());
        assert!(property.type_id() == Some(TypeId::of::<f64>()));
        let mut value = 1.0f64;
        assert!(matches!(
            property.set(None, &mut ValueSlot::new(&mut value)),
            Err(ReflectError::NotFound { .. })
        ));
        assert_eq!(property.get_value::<f64>(None).unwrap(), 2.5);
    }
}
