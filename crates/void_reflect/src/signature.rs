//! Typed trampolines
//!
//! Native closures are turned into erased [`Invoke`] objects through the
//! [`IntoFunction`] (free functions) and [`IntoMethod`] (receiver first)
//! traits. Both are implemented once per arity by macro, keyed on a marker
//! `fn(..) -> R` type so that the native signature can be recovered without
//! any pointer reinterpretation.
//!
//! Arguments are taken by value and cloned out of their slots; the receiver
//! of a member function is borrowed in place. Results are returned by value.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::slice;

use smallvec::SmallVec;
use void_core::Reflect;

use crate::error::{ReflectError, Result};
use crate::parameter::{ParamInfo, ParamTraits};
use crate::slot::ValueSlot;

/// Inline capacity of per-call argument arrays
pub const INLINE_ARGS: usize = 8;

/// Call-scoped argument array
pub type SlotArray<'a> = SmallVec<[ValueSlot<'a>; INLINE_ARGS]>;

/// Erased call entry point of one native signature
pub trait Invoke: Send + Sync {
    /// Run the native function.
    ///
    /// # Safety
    ///
    /// `args` must hold exactly the declared arguments, each already
    /// converted to the declared parameter type at its position. The receiver
    /// slot of a mutable member function must not be `CONST`. `result`, when
    /// present, must accept the declared result type.
    unsafe fn invoke(
        &self,
        args: &mut [ValueSlot<'_>],
        result: Option<&mut ValueSlot<'_>>,
    ) -> Result<()>;
}

/// Declared shape of a native signature
#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    /// Result at index 0, then every argument (receiver first for members)
    pub params: Vec<ParamInfo>,
    pub is_member: bool,
    pub is_const: bool,
}

impl Signature {
    /// Free function signature; an empty list declares a void result
    pub fn function(mut params: Vec<ParamInfo>) -> Self {
        Self::ensure_result(&mut params);
        Self {
            params,
            is_member: false,
            is_const: false,
        }
    }

    /// Member function signature; flags the receiver at index 1
    pub fn member(mut params: Vec<ParamInfo>, is_const: bool) -> Self {
        Self::ensure_result(&mut params);
        if let Some(this) = params.get_mut(1) {
            let mut traits = this.traits() | ParamTraits::THIS_PTR | ParamTraits::REFERENCE;
            if is_const {
                traits.insert(ParamTraits::CONST);
            }
            *this = this.with_traits(traits);
        }
        Self {
            params,
            is_member: true,
            is_const,
        }
    }

    /// Give a signature built without a result entry a void one
    pub(crate) fn normalize(mut self) -> Self {
        Self::ensure_result(&mut self.params);
        self
    }

    fn ensure_result(params: &mut Vec<ParamInfo>) {
        if params.is_empty() {
            params.push(ParamInfo::void());
        }
    }

    pub fn result(&self) -> &ParamInfo {
        &self.params[0]
    }

    pub fn arguments(&self) -> &[ParamInfo] {
        &self.params[1..]
    }
}

/// A native free function usable as a reflected function
pub trait IntoFunction<Marker>: Send + Sync + 'static {
    fn signature() -> Signature;
    fn into_invoker(self) -> Box<dyn Invoke>;
}

/// A native function taking a receiver `&C` or `&mut C` first
pub trait IntoMethod<C, Marker>: Send + Sync + 'static {
    fn signature() -> Signature;
    fn into_invoker(self) -> Box<dyn Invoke>;
}

/// Invoker for a typed closure; `M` is the marker signature
pub struct FnInvoker<F, M> {
    func: F,
    _marker: PhantomData<fn() -> M>,
}

impl<F, M> FnInvoker<F, M> {
    fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

/// Invoker for a hand-written closure operating on the slots directly
pub struct RawInvoker<F>(F);

impl<F> RawInvoker<F>
where
    F: Fn(&mut [ValueSlot<'_>], Option<&mut ValueSlot<'_>>) -> Result<()> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self(func)
    }
}

impl<F> Invoke for RawInvoker<F>
where
    F: Fn(&mut [ValueSlot<'_>], Option<&mut ValueSlot<'_>>) -> Result<()> + Send + Sync,
{
    unsafe fn invoke(
        &self,
        args: &mut [ValueSlot<'_>],
        result: Option<&mut ValueSlot<'_>>,
    ) -> Result<()> {
        (self.0)(args, result)
    }
}

impl<F> fmt::Debug for RawInvoker<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawInvoker")
    }
}

/// Clone the next converted argument.
///
/// # Safety
///
/// The slot must have been converted to `T`.
pub(crate) unsafe fn next_arg<T: Clone>(slots: &mut slice::Iter<'_, ValueSlot<'_>>) -> Result<T> {
    match slots.next() {
        Some(slot) => Ok(slot.get_unchecked::<T>().clone()),
        None => Err(ReflectError::ArgumentCountMismatch {
            method: String::new(),
            expected: "more".into(),
            got: 0,
        }),
    }
}

/// Store a native return value into the optional result slot
pub(crate) fn store_return<R: Reflect>(result: Option<&mut ValueSlot<'_>>, value: R) -> Result<()> {
    if TypeId::of::<R>() == TypeId::of::<()>() {
        return Ok(());
    }
    match result {
        Some(slot) => {
            if slot.store_result(value) {
                Ok(())
            } else {
                Err(ReflectError::TypeConversionFailure {
                    method: String::new(),
                    position: "result".into(),
                    expected: slot.param().to_string(),
                    found: R::type_name().into(),
                })
            }
        }
        None => Ok(()),
    }
}

fn missing_receiver() -> ReflectError {
    ReflectError::ArgumentCountMismatch {
        method: String::new(),
        expected: "a receiver".into(),
        got: 0,
    }
}

macro_rules! impl_into_function {
    ($($arg:ident $var:ident),*) => {
        impl<F, R, $($arg,)*> IntoFunction<fn($($arg),*) -> R> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: Reflect,
            $($arg: Reflect + Clone,)*
        {
            fn signature() -> Signature {
                Signature::function(vec![ParamInfo::of::<R>(), $(ParamInfo::of::<$arg>()),*])
            }

            fn into_invoker(self) -> Box<dyn Invoke> {
                Box::new(FnInvoker::<F, fn($($arg),*) -> R>::new(self))
            }
        }

        impl<F, R, $($arg,)*> Invoke for FnInvoker<F, fn($($arg),*) -> R>
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: Reflect,
            $($arg: Reflect + Clone,)*
        {
            #[allow(unused_variables, unused_mut)]
            unsafe fn invoke(
                &self,
                args: &mut [ValueSlot<'_>],
                result: Option<&mut ValueSlot<'_>>,
            ) -> Result<()> {
                let mut slots = args.iter();
                $(let $var = next_arg::<$arg>(&mut slots)?;)*
                store_return(result, (self.func)($($var),*))
            }
        }
    };
}

macro_rules! impl_into_method {
    ($($arg:ident $var:ident),*) => {
        impl<F, C, R, $($arg,)*> IntoMethod<C, fn(&C, $($arg),*) -> R> for F
        where
            F: Fn(&C, $($arg),*) -> R + Send + Sync + 'static,
            C: Reflect,
            R: Reflect,
            $($arg: Reflect + Clone,)*
        {
            fn signature() -> Signature {
                Signature::member(
                    vec![ParamInfo::of::<R>(), ParamInfo::of::<C>(), $(ParamInfo::of::<$arg>()),*],
                    true,
                )
            }

            fn into_invoker(self) -> Box<dyn Invoke> {
                Box::new(FnInvoker::<F, fn(&C, $($arg),*) -> R>::new(self))
            }
        }

        impl<F, C, R, $($arg,)*> Invoke for FnInvoker<F, fn(&C, $($arg),*) -> R>
        where
            F: Fn(&C, $($arg),*) -> R + Send + Sync + 'static,
            C: Reflect,
            R: Reflect,
            $($arg: Reflect + Clone,)*
        {
            #[allow(unused_mut, unused_variables)]
            unsafe fn invoke(
                &self,
                args: &mut [ValueSlot<'_>],
                result: Option<&mut ValueSlot<'_>>,
            ) -> Result<()> {
                let (this, rest) = args.split_first_mut().ok_or_else(missing_receiver)?;
                let mut slots = rest.iter();
                $(let $var = next_arg::<$arg>(&mut slots)?;)*
                let value = (self.func)(this.get_unchecked::<C>(), $($var),*);
                store_return(result, value)
            }
        }

        impl<F, C, R, $($arg,)*> IntoMethod<C, fn(&mut C, $($arg),*) -> R> for F
        where
            F: Fn(&mut C, $($arg),*) -> R + Send + Sync + 'static,
            C: Reflect,
            R: Reflect,
            $($arg: Reflect + Clone,)*
        {
            fn signature() -> Signature {
                Signature::member(
                    vec![ParamInfo::of::<R>(), ParamInfo::of::<C>(), $(ParamInfo::of::<$arg>()),*],
                    false,
                )
            }

            fn into_invoker(self) -> Box<dyn Invoke> {
                Box::new(FnInvoker::<F, fn(&mut C, $($arg),*) -> R>::new(self))
            }
        }

        impl<F, C, R, $($arg,)*> Invoke for FnInvoker<F, fn(&mut C, $($arg),*) -> R>
        where
            F: Fn(&mut C, $($arg),*) -> R + Send + Sync + 'static,
            C: Reflect,
            R: Reflect,
            $($arg: Reflect + Clone,)*
        {
            #[allow(unused_mut, unused_variables)]
            unsafe fn invoke(
                &self,
                args: &mut [ValueSlot<'_>],
                result: Option<&mut ValueSlot<'_>>,
            ) -> Result<()> {
                let (this, rest) = args.split_first_mut().ok_or_else(missing_receiver)?;
                let mut slots = rest.iter();
                // Arguments are cloned out before the receiver is borrowed mutably
                $(let $var = next_arg::<$arg>(&mut slots)?;)*
                let value = (self.func)(this.get_unchecked_mut::<C>(), $($var),*);
                store_return(result, value)
            }
        }
    };
}

impl_into_function!();
impl_into_function!(A1 a1);
impl_into_function!(A1 a1, A2 a2);
impl_into_function!(A1 a1, A2 a2, A3 a3);
impl_into_function!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_into_function!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_into_function!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_into_function!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_into_function!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);

impl_into_method!();
impl_into_method!(A1 a1);
impl_into_method!(A1 a1, A2 a2);
impl_into_method!(A1 a1, A2 a2, A3 a3);
impl_into_method!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_into_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_into_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_into_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);

// ========== Argument Tuples ==========

/// A tuple of native arguments that can be marshaled into value slots
pub trait ArgList: Sized + Send + 'static {
    /// Number of arguments
    const COUNT: usize;

    /// Parameter descriptors in order
    fn params() -> Vec<ParamInfo>;

    /// Bind a slot to every element
    fn bind_slots(&mut self) -> SlotArray<'_>;
}

/// A typed hook callable with an argument tuple
pub trait HookFn<Args, R>: Send + Sync + 'static {
    fn call(&self, args: Args) -> R;
}

macro_rules! impl_arg_list {
    ($count:literal; $($arg:ident $var:ident),*) => {
        impl<$($arg,)*> ArgList for ($($arg,)*)
        where
            $($arg: Reflect,)*
        {
            const COUNT: usize = $count;

            fn params() -> Vec<ParamInfo> {
                vec![$(ParamInfo::of::<$arg>()),*]
            }

            #[allow(clippy::unused_unit)]
            fn bind_slots(&mut self) -> SlotArray<'_> {
                let ($($var,)*) = self;
                let mut slots = SlotArray::new();
                $(slots.push(ValueSlot::new($var));)*
                slots
            }
        }

        impl<F, R, $($arg,)*> HookFn<($($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
        {
            fn call(&self, args: ($($arg,)*)) -> R {
                let ($($var,)*) = args;
                self($($var),*)
            }
        }
    };
}

impl_arg_list!(0;);
impl_arg_list!(1; A1 a1);
impl_arg_list!(2; A1 a1, A2 a2);
impl_arg_list!(3; A1 a1, A2 a2, A3 a3);
impl_arg_list!(4; A1 a1, A2 a2, A3 a3, A4 a4);
impl_arg_list!(5; A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_arg_list!(6; A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_arg_list!(7; A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_arg_list!(8; A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);
