//! Invokable descriptors
//!
//! A [`Method`] describes one native callable by signature and exposes an
//! erased entry point. A call runs in three strictly ordered phases:
//!
//! 1. Padding: missing trailing arguments are filled from registered defaults.
//! 2. Validation: the receiver, then every argument in order, is converted to
//!    its declared type; the result slot is checked for compatibility.
//! 3. Invocation: the typed trampoline runs the native function.
//!
//! Any failure in the first two phases aborts the call before native code
//! runs. Caller slots are never modified by padding or conversion; the
//! working array holds aliases.

use std::fmt;
use std::sync::Arc;

use void_core::Reflect;

use crate::attribute::AttributeMap;
use crate::error::{ReflectError, Result};
use crate::parameter::{DefaultValue, ParamInfo, ParamMetadata, ParamTraits};
use crate::signature::{IntoFunction, IntoMethod, Invoke, Signature, SlotArray};
use crate::slot::ValueSlot;

/// A reflected function or member function
pub struct Method {
    name: String,
    deprecated_name: Option<String>,
    signature: Signature,
    has_bus_id: bool,
    /// Name, tooltip and default per argument
    metadata: Vec<ParamMetadata>,
    overload: Option<Box<Method>>,
    attributes: AttributeMap,
    invoker: Box<dyn Invoke>,
}

impl Method {
    /// Reflect a free function
    pub fn from_fn<M, F: IntoFunction<M>>(name: impl Into<String>, func: F) -> Self {
        Self::from_raw(name, F::signature(), func.into_invoker())
    }

    /// Reflect a function taking a receiver first
    pub fn from_method<C, M, F: IntoMethod<C, M>>(name: impl Into<String>, func: F) -> Self {
        Self::from_raw(name, F::signature(), func.into_invoker())
    }

    /// Reflect a hand-written invoker with an explicit signature
    pub fn from_raw(name: impl Into<String>, signature: Signature, invoker: Box<dyn Invoke>) -> Self {
        let signature = signature.normalize();
        let arguments = signature.params.len().saturating_sub(1);
        Self {
            name: name.into(),
            deprecated_name: None,
            signature,
            has_bus_id: false,
            metadata: vec![ParamMetadata::default(); arguments],
            overload: None,
            attributes: AttributeMap::new(),
            invoker,
        }
    }

    /// Mark the first argument (after any receiver) as the bus address
    pub(crate) fn with_bus_id(mut self) -> Self {
        self.has_bus_id = true;
        self
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ========== Metadata ==========

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deprecated_name(&self) -> Option<&str> {
        self.deprecated_name.as_deref()
    }

    pub fn with_deprecated_name(mut self, name: impl Into<String>) -> Self {
        self.deprecated_name = Some(name.into());
        self
    }

    pub(crate) fn clear_deprecated_name(&mut self) {
        self.deprecated_name = None;
    }

    /// Name the arguments in order. Extra names are ignored.
    pub fn with_argument_names(mut self, names: &[&str]) -> Self {
        for (metadata, name) in self.metadata.iter_mut().zip(names) {
            metadata.name = Some((*name).to_string());
        }
        self
    }

    /// Replace the metadata of one argument, validating any default it carries
    pub fn with_argument(mut self, index: usize, metadata: ParamMetadata) -> Result<Self> {
        if let Some(default) = &metadata.default {
            self.check_default(index, default)?;
        }
        match self.metadata.get_mut(index) {
            Some(slot) => *slot = metadata,
            None => return Err(self.index_error(index)),
        }
        Ok(self)
    }

    /// Register a default for one argument
    pub fn with_default<T: Reflect + Clone>(mut self, index: usize, value: T) -> Result<Self> {
        self.set_default_value(index, DefaultValue::new(value))?;
        Ok(self)
    }

    /// Register a shared default for one argument
    pub fn set_default_value(&mut self, index: usize, default: Arc<DefaultValue>) -> Result<()> {
        self.check_default(index, &default)?;
        self.metadata[index].default = Some(default);
        Ok(())
    }

    fn check_default(&self, index: usize, default: &DefaultValue) -> Result<()> {
        let Some(param) = self.argument(index) else {
            return Err(self.index_error(index));
        };
        if self.is_member() && index == 0 {
            return Err(ReflectError::signature(
                &self.name,
                "the this pointer cannot have a default",
            ));
        }
        let compatible = match (param.type_id(), default.param().type_info()) {
            (None, _) => true,
            (Some(target), Some(source)) => source.is_type_of(target),
            (Some(_), None) => false,
        };
        if !compatible {
            return Err(ReflectError::signature(
                &self.name,
                format!(
                    "default for argument {} is {}, expected {}",
                    index,
                    default.param().name(),
                    param.name()
                ),
            ));
        }
        Ok(())
    }

    fn index_error(&self, index: usize) -> ReflectError {
        ReflectError::signature(
            &self.name,
            format!("argument {} out of range ({} arguments)", index, self.num_arguments()),
        )
    }

    /// Add and remove trait flags on one parameter; index 0 is the result,
    /// arguments start at 1. Returns false when out of range.
    pub fn override_parameter_traits(
        &mut self,
        index: usize,
        add: ParamTraits,
        remove: ParamTraits,
    ) -> bool {
        match self.signature.params.get_mut(index) {
            Some(param) => {
                *param = param.with_traits(param.traits().union(add).difference(remove));
                true
            }
            None => false,
        }
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }

    pub fn with_attribute<T: std::any::Any + Send + Sync>(mut self, key: &str, value: T) -> Self {
        self.attributes.insert(key, value);
        self
    }

    // ========== Signature ==========

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_member(&self) -> bool {
        self.signature.is_member
    }

    pub fn is_const(&self) -> bool {
        self.signature.is_const
    }

    pub fn has_bus_id(&self) -> bool {
        self.has_bus_id
    }

    pub fn result(&self) -> &ParamInfo {
        self.signature.result()
    }

    pub fn has_result(&self) -> bool {
        !self.result().is_void()
    }

    /// Number of arguments, including the this pointer and bus address
    pub fn num_arguments(&self) -> usize {
        self.signature.params.len().saturating_sub(1)
    }

    pub fn argument(&self, index: usize) -> Option<&ParamInfo> {
        self.signature.params.get(index + 1)
    }

    pub fn arguments(&self) -> &[ParamInfo] {
        self.signature.arguments()
    }

    pub fn argument_name(&self, index: usize) -> Option<&str> {
        self.metadata.get(index)?.name.as_deref()
    }

    pub fn argument_tooltip(&self, index: usize) -> Option<&str> {
        self.metadata.get(index)?.tooltip.as_deref()
    }

    pub fn default_value(&self, index: usize) -> Option<&Arc<DefaultValue>> {
        self.metadata.get(index)?.default.as_ref()
    }

    /// Like [`default_value`](Self::default_value) but reports the gap
    pub fn default_value_checked(&self, index: usize) -> Result<&Arc<DefaultValue>> {
        self.default_value(index)
            .ok_or_else(|| ReflectError::MissingDefaultValue {
                method: self.name.clone(),
                index,
            })
    }

    /// Receiver descriptor of a member function
    pub fn this_argument(&self) -> Option<&ParamInfo> {
        if self.is_member() {
            self.argument(0)
        } else {
            None
        }
    }

    /// Address descriptor of a bus dispatcher
    pub fn bus_id_argument(&self) -> Option<&ParamInfo> {
        if self.has_bus_id {
            self.argument(usize::from(self.is_member()))
        } else {
            None
        }
    }

    /// Arguments a caller must supply: the total minus the trailing run of
    /// arguments that have defaults
    pub fn min_arguments(&self) -> usize {
        let trailing = self
            .metadata
            .iter()
            .rev()
            .take_while(|metadata| metadata.default.is_some())
            .count();
        self.num_arguments() - trailing
    }

    // ========== Invocation ==========

    /// Call with erased arguments. Failures are logged and reported as false.
    pub fn call(&self, args: &mut [ValueSlot<'_>], result: Option<&mut ValueSlot<'_>>) -> bool {
        match self.try_call(args, result) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("{}", err);
                false
            }
        }
    }

    /// Call with erased arguments
    pub fn try_call(
        &self,
        args: &mut [ValueSlot<'_>],
        mut result: Option<&mut ValueSlot<'_>>,
    ) -> Result<()> {
        let mut work = self.prepare(args)?;
        self.validate(&mut work, result.as_deref())?;
        // SAFETY: `validate` converted every argument to its declared type
        // and checked the receiver's mutability and the result slot
        unsafe { self.invoker.invoke(&mut work, result.as_deref_mut()) }
            .map_err(|err| err.for_method(&self.name))
    }

    /// Run every check `try_call` performs without calling native code
    pub fn is_callable(
        &self,
        args: &mut [ValueSlot<'_>],
        result: Option<&ValueSlot<'_>>,
    ) -> Result<()> {
        let mut work = self.prepare(args)?;
        self.validate(&mut work, result)
    }

    /// Working array: aliases of the supplied arguments followed by the
    /// defaults for any missing trailing arguments
    fn prepare<'s>(&self, args: &'s mut [ValueSlot<'_>]) -> Result<SlotArray<'s>> {
        let total = self.num_arguments();
        let supplied = args.len();
        if supplied > total || supplied < self.min_arguments() {
            let expected = if self.min_arguments() == total {
                total.to_string()
            } else {
                format!("{}..={}", self.min_arguments(), total)
            };
            return Err(ReflectError::ArgumentCountMismatch {
                method: self.name.clone(),
                expected,
                got: supplied,
            });
        }

        let mut work: SlotArray<'s> = args.iter_mut().map(|slot| slot.reborrow()).collect();
        for index in supplied..total {
            let default = self
                .default_value_checked(index)?
                .to_slot()
                .ok_or_else(|| ReflectError::MissingDefaultValue {
                    method: self.name.clone(),
                    index,
                })?;
            work.push(default);
        }
        Ok(work)
    }

    fn validate(&self, args: &mut [ValueSlot<'_>], result: Option<&ValueSlot<'_>>) -> Result<()> {
        for (index, (slot, param)) in args.iter_mut().zip(self.arguments()).enumerate() {
            let Some(target) = param.type_id() else {
                continue;
            };
            let found = slot.param().name();
            let converted = slot.convert_to(target);
            if index == 0 && self.is_member() {
                if !converted || (!self.is_const() && slot.is_const()) {
                    return Err(ReflectError::InvalidThisPointer {
                        method: self.name.clone(),
                        expected: param.to_string(),
                        found: found.to_string(),
                    });
                }
            } else if !converted {
                return Err(ReflectError::TypeConversionFailure {
                    method: self.name.clone(),
                    position: format!("argument {}", index),
                    expected: param.to_string(),
                    found: found.to_string(),
                });
            }
        }
        if let Some(result) = result {
            if self.has_result() && !result.can_store(self.result()) {
                return Err(ReflectError::TypeConversionFailure {
                    method: self.name.clone(),
                    position: "result".into(),
                    expected: result.param().to_string(),
                    found: self.result().to_string(),
                });
            }
        }
        Ok(())
    }

    // ========== Overloads ==========

    /// Append a same-named method to the overload chain. Fails when an
    /// existing entry has the same argument types.
    pub fn add_overload(&mut self, overload: Method) -> Result<()> {
        if self.overloads().any(|existing| existing.same_arguments(&overload)) {
            return Err(ReflectError::conflict("overload", overload.name));
        }
        let mut tail = &mut self.overload;
        while let Some(next) = tail {
            tail = &mut next.overload;
        }
        *tail = Some(Box::new(overload));
        Ok(())
    }

    /// Whether `candidate` is linked somewhere after this method in its chain
    pub fn is_an_overload(&self, candidate: &Method) -> bool {
        self.overloads().skip(1).any(|m| std::ptr::eq(m, candidate))
    }

    pub fn is_overloaded(&self) -> bool {
        self.overload.is_some()
    }

    /// This method followed by its overloads
    pub fn overloads(&self) -> Overloads<'_> {
        Overloads { next: Some(self) }
    }

    /// First method in the chain that accepts `args`
    pub fn select_overload(&self, args: &mut [ValueSlot<'_>]) -> Option<&Method> {
        self.overloads().find(|m| m.is_callable(args, None).is_ok())
    }

    /// Split the chain into its separate methods, this one first
    pub(crate) fn into_overloads(mut self) -> Vec<Method> {
        let mut next = self.overload.take();
        let mut methods = vec![self];
        while let Some(mut overload) = next {
            next = overload.overload.take();
            methods.push(*overload);
        }
        methods
    }

    fn same_arguments(&self, other: &Method) -> bool {
        self.num_arguments() == other.num_arguments()
            && self
                .arguments()
                .iter()
                .zip(other.arguments())
                .all(|(a, b)| a.same_type(b))
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("result", self.result())
            .field("arguments", &self.arguments())
            .field("member", &self.is_member())
            .field("overloads", &self.overloads().count())
            .finish()
    }
}

/// Iterator over an overload chain
pub struct Overloads<'a> {
    next: Option<&'a Method>,
}

impl<'a> Iterator for Overloads<'a> {
    type Item = &'a Method;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.overload.as_deref();
        Some(current)
    }
}
