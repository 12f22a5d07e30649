//! Value slots
//!
//! A [`ValueSlot`] is the call-scoped unit of the erased calling convention:
//! a parameter description bound to an actual value. The value is either
//! borrowed from the caller for the slot's lifetime `'a`, or owned by the slot
//! itself. Small owned values live in a 32-byte inline scratch buffer, larger
//! ones on the heap.
//!
//! Conversions never copy the value: converting to a base type only moves the
//! bound view to the embedded base.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};

use void_core::{Reflect, TypeInfo};

use crate::parameter::{ParamInfo, ParamTraits};

/// Size of the inline scratch buffer
pub const SCRATCH_SIZE: usize = 32;

#[repr(C, align(16))]
struct Scratch([MaybeUninit<u8>; SCRATCH_SIZE]);

impl Scratch {
    const fn new() -> Self {
        Self([MaybeUninit::uninit(); SCRATCH_SIZE])
    }

    fn fits<T>() -> bool {
        mem::size_of::<T>() <= SCRATCH_SIZE && mem::align_of::<T>() <= mem::align_of::<Scratch>()
    }
}

#[derive(Clone, Copy)]
enum Place {
    Inline,
    Heap(NonNull<u8>),
}

enum Storage {
    Empty,
    /// Caller-owned value
    Borrowed(NonNull<u8>),
    /// Slot-owned value of type `owned`; `view` is the byte offset of the
    /// bound (possibly converted) view into it
    Owned {
        place: Place,
        view: usize,
        owned: TypeInfo,
        drop_fn: unsafe fn(*mut u8),
    },
}

/// Called after a successful [`ValueSlot::store_result`]
pub type AssignedCallback<'a> = Box<dyn FnMut(&ValueSlot<'_>) + 'a>;

/// A parameter description bound to a value
pub struct ValueSlot<'a> {
    param: ParamInfo,
    storage: Storage,
    scratch: Scratch,
    on_assigned: Option<AssignedCallback<'a>>,
    _borrow: PhantomData<&'a mut ()>,
}

unsafe fn drop_inline<T>(ptr: *mut u8) {
    ptr::drop_in_place(ptr.cast::<T>());
}

unsafe fn drop_boxed<T>(ptr: *mut u8) {
    drop(Box::from_raw(ptr.cast::<T>()));
}

impl<'a> ValueSlot<'a> {
    fn with(param: ParamInfo, storage: Storage) -> Self {
        Self {
            param,
            storage,
            scratch: Scratch::new(),
            on_assigned: None,
            _borrow: PhantomData,
        }
    }

    // ========== Construction ==========

    /// Bind to a mutable caller-owned value
    pub fn new<T: Reflect>(value: &'a mut T) -> Self {
        let param = ParamInfo::of::<T>();
        let traits = param.traits() | ParamTraits::REFERENCE;
        Self::with(
            param.with_traits(traits),
            Storage::Borrowed(NonNull::from(value).cast()),
        )
    }

    /// Bind to a read-only caller-owned value
    pub fn from_ref<T: Reflect>(value: &'a T) -> Self {
        let param = ParamInfo::of::<T>();
        let traits = param.traits() | ParamTraits::REFERENCE | ParamTraits::CONST;
        Self::with(
            param.with_traits(traits),
            Storage::Borrowed(NonNull::from(value).cast()),
        )
    }

    /// Bind to a raw address.
    ///
    /// # Safety
    ///
    /// `address` must point to a live value of the type described by
    /// `param` for all of `'a`, and must not be aliased mutably elsewhere
    /// while the slot is used. If `param` is not flagged `CONST`, the value
    /// must be writable.
    pub unsafe fn from_raw(address: NonNull<u8>, param: ParamInfo) -> Self {
        Self::with(param, Storage::Borrowed(address))
    }

    /// Unbound slot that will accept and adopt any stored value
    pub fn untyped() -> Self {
        Self::with(ParamInfo::untyped(), Storage::Empty)
    }

    /// Unbound slot expecting a value described by `param`
    pub fn typed(param: ParamInfo) -> Self {
        Self::with(param, Storage::Empty)
    }

    /// Unbound slot expecting a `T`
    pub fn result_of<T: Reflect>() -> Self {
        Self::typed(ParamInfo::of::<T>())
    }

    /// Register a callback run after every successful store
    pub fn on_assigned(mut self, callback: impl FnMut(&ValueSlot<'_>) + 'a) -> Self {
        self.on_assigned = Some(Box::new(callback));
        self
    }

    /// Rebind to a mutable caller-owned value, releasing anything owned
    pub fn bind<T: Reflect>(&mut self, value: &'a mut T) {
        self.release();
        let param = ParamInfo::of::<T>();
        self.param = param.with_traits(param.traits() | ParamTraits::REFERENCE);
        self.storage = Storage::Borrowed(NonNull::from(value).cast());
    }

    /// A slot borrowing this slot's current value, with the same type and
    /// traits. The callback is not carried over.
    pub fn reborrow(&mut self) -> ValueSlot<'_> {
        let storage = match self.address_mut() {
            Some(address) => Storage::Borrowed(address),
            None => Storage::Empty,
        };
        ValueSlot::with(self.param, storage)
    }

    // ========== Queries ==========

    pub fn param(&self) -> &ParamInfo {
        &self.param
    }

    pub fn type_info(&self) -> Option<&TypeInfo> {
        self.param.type_info()
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.param.type_id()
    }

    pub fn traits(&self) -> ParamTraits {
        self.param.traits()
    }

    /// Add trait flags to the slot's description
    pub fn add_traits(&mut self, traits: ParamTraits) {
        self.param.traits_mut().insert(traits);
    }

    pub fn is_const(&self) -> bool {
        self.param.traits().contains(ParamTraits::CONST)
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self.storage, Storage::Empty)
    }

    /// Whether the slot owns its value
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned { .. })
    }

    /// Address of the bound value
    pub fn address(&self) -> Option<NonNull<u8>> {
        match self.storage {
            Storage::Empty => None,
            Storage::Borrowed(address) => Some(address),
            Storage::Owned { place, view, .. } => {
                let base = match place {
                    Place::Inline => self.scratch.0.as_ptr() as *mut u8,
                    Place::Heap(base) => base.as_ptr(),
                };
                NonNull::new(base.wrapping_add(view))
            }
        }
    }

    fn address_mut(&mut self) -> Option<NonNull<u8>> {
        match self.storage {
            Storage::Empty => None,
            Storage::Borrowed(address) => Some(address),
            Storage::Owned { place, view, .. } => {
                let base = match place {
                    Place::Inline => self.scratch.0.as_mut_ptr().cast::<u8>(),
                    Place::Heap(base) => base.as_ptr(),
                };
                NonNull::new(base.wrapping_add(view))
            }
        }
    }

    /// Borrow the value if the slot currently holds exactly a `T`
    pub fn get<T: 'static>(&self) -> Option<&T> {
        if !self.param.is_type::<T>() {
            return None;
        }
        self.address().map(|address| unsafe { address.cast::<T>().as_ref() })
    }

    /// Mutably borrow the value if the slot holds exactly a writable `T`
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if !self.param.is_type::<T>() || self.is_const() {
            return None;
        }
        self.address_mut()
            .map(|address| unsafe { address.cast::<T>().as_mut() })
    }

    /// Reinterpret the bound value as a `T`.
    ///
    /// # Safety
    ///
    /// A prior [`convert_to`](Self::convert_to) to `T` (or an exact type
    /// match) must have succeeded on this slot and the slot must be bound.
    /// This is not checked.
    pub unsafe fn get_unchecked<T>(&self) -> &T {
        match self.address() {
            Some(address) => address.cast::<T>().as_ref(),
            None => unreachable_unbound(),
        }
    }

    /// Mutable variant of [`get_unchecked`](Self::get_unchecked).
    ///
    /// # Safety
    ///
    /// Same as [`get_unchecked`](Self::get_unchecked); additionally the slot
    /// must not be `CONST`.
    pub unsafe fn get_unchecked_mut<T>(&mut self) -> &mut T {
        match self.address_mut() {
            Some(address) => address.cast::<T>().as_mut(),
            None => unreachable_unbound(),
        }
    }

    // ========== Conversion ==========

    /// Convert the bound value to `target`, trying identity, then the
    /// enumeration's underlying type, then a cast to a base type.
    /// On success the slot describes, and points at, the target type.
    pub fn convert_to(&mut self, target: TypeId) -> bool {
        let Some(source) = self.param.type_info().copied() else {
            return false;
        };
        let Some(address) = self.address() else {
            return false;
        };
        if source.type_id == target {
            return true;
        }
        if let Some(underlying) = source.underlying() {
            if underlying.type_id == target {
                self.rebind(address, underlying);
                return true;
            }
        }
        // SAFETY: the slot is bound to a live value of `source`
        match unsafe { source.cast(address, target) } {
            Some((converted, info)) => {
                self.rebind(converted, info);
                true
            }
            None => false,
        }
    }

    /// Typed shorthand for [`convert_to`](Self::convert_to)
    pub fn convert_to_type<T: 'static>(&mut self) -> bool {
        self.convert_to(TypeId::of::<T>())
    }

    fn rebind(&mut self, address: NonNull<u8>, info: TypeInfo) {
        let traits = self.param.traits();
        self.param = ParamInfo::from_type_info(info).with_traits(traits);
        match &mut self.storage {
            Storage::Borrowed(bound) => *bound = address,
            Storage::Owned { place, view, .. } => {
                let base = match place {
                    Place::Inline => self.scratch.0.as_ptr() as usize,
                    Place::Heap(base) => base.as_ptr() as usize,
                };
                *view = address.as_ptr() as usize - base;
            }
            Storage::Empty => {}
        }
    }

    // ========== Results ==========

    /// Whether a value described by `result` could be stored into this slot
    pub fn can_store(&self, result: &ParamInfo) -> bool {
        let Some(info) = self.param.type_info() else {
            return true;
        };
        if Some(info.type_id) == result.type_id() {
            return !(self.is_bound() && self.is_const());
        }
        !self.is_bound()
            && result
                .type_info()
                .map_or(false, |r| r.is_type_of(info.type_id))
    }

    /// Store a result value.
    ///
    /// - Same type, bound: the value is assigned through the binding.
    /// - Same type, unbound: the slot takes ownership.
    /// - Untyped: the slot adopts `T` and takes ownership.
    /// - Unbound, `T` derives from the slot's type: the slot owns the value and
    ///   views its base.
    ///
    /// Anything else fails. The assignment callback runs after a successful store.
    pub fn store_result<T: Reflect>(&mut self, value: T) -> bool {
        match self.param.type_info().copied() {
            None => {
                self.store_owned(value, ParamInfo::of::<T>());
            }
            Some(info) if info.type_id == TypeId::of::<T>() => {
                if self.is_bound() {
                    if self.is_const() {
                        return false;
                    }
                    match self.address_mut() {
                        // SAFETY: the slot is bound to a writable `T`
                        Some(address) => unsafe { *address.cast::<T>().as_ptr() = value },
                        None => return false,
                    }
                } else {
                    let param = self.param;
                    self.store_owned(value, param);
                }
            }
            Some(info) => {
                if self.is_bound() || !TypeInfo::of::<T>().is_type_of(info.type_id) {
                    return false;
                }
                let traits = self.param.traits();
                self.store_owned(value, ParamInfo::of::<T>().with_traits(traits));
                if !self.convert_to(info.type_id) {
                    return false;
                }
            }
        }
        self.notify_assigned();
        true
    }

    fn notify_assigned(&mut self) {
        if let Some(mut callback) = self.on_assigned.take() {
            callback(self);
            self.on_assigned = Some(callback);
        }
    }

    fn store_owned<T: Reflect>(&mut self, value: T, param: ParamInfo) {
        self.release();
        let owned = TypeInfo::of::<T>();
        self.storage = if Scratch::fits::<T>() {
            // SAFETY: size and alignment checked by `fits`
            unsafe { ptr::write(self.scratch.0.as_mut_ptr().cast::<T>(), value) };
            Storage::Owned {
                place: Place::Inline,
                view: 0,
                owned,
                drop_fn: drop_inline::<T>,
            }
        } else {
            let base = NonNull::from(Box::leak(Box::new(value))).cast::<u8>();
            Storage::Owned {
                place: Place::Heap(base),
                view: 0,
                owned,
                drop_fn: drop_boxed::<T>,
            }
        };
        self.param = param;
    }

    /// Create a slot owning `value`
    pub fn from_value<T: Reflect>(value: T) -> ValueSlot<'static> {
        let mut slot = ValueSlot::with(ParamInfo::of::<T>(), Storage::Empty);
        slot.store_owned(value, ParamInfo::of::<T>());
        slot
    }

    /// Move an owned `T` out of the slot, leaving it unbound
    pub fn take<T: 'static>(&mut self) -> Option<T> {
        let Storage::Owned { place, view: 0, owned, .. } = self.storage else {
            return None;
        };
        if owned.type_id != TypeId::of::<T>() {
            return None;
        }
        self.storage = Storage::Empty;
        // SAFETY: the slot owned a `T` at offset 0 and no longer drops it
        let value = unsafe {
            match place {
                Place::Inline => ptr::read(self.scratch.0.as_ptr().cast::<T>()),
                Place::Heap(base) => *Box::from_raw(base.as_ptr().cast::<T>()),
            }
        };
        Some(value)
    }

    /// Move the owned value bitwise to `destination`, leaving the slot unbound.
    /// Returns the moved type, or `None` when the slot does not own a value.
    ///
    /// # Safety
    ///
    /// `destination` must be valid for writes of the owned type's size and
    /// alignment and must not hold a live value.
    pub unsafe fn move_owned_to(&mut self, destination: NonNull<u8>) -> Option<TypeInfo> {
        let Storage::Owned { place, owned, .. } = self.storage else {
            return None;
        };
        let source = match place {
            Place::Inline => self.scratch.0.as_ptr() as *const u8,
            Place::Heap(base) => base.as_ptr() as *const u8,
        };
        ptr::copy_nonoverlapping(source, destination.as_ptr(), owned.size);
        if let Place::Heap(base) = place {
            if owned.size != 0 {
                std::alloc::dealloc(
                    base.as_ptr(),
                    std::alloc::Layout::from_size_align_unchecked(owned.size, owned.align),
                );
            }
        }
        self.storage = Storage::Empty;
        Some(owned)
    }

    fn release(&mut self) {
        if let Storage::Owned { place, owned, drop_fn, .. } = mem::replace(&mut self.storage, Storage::Empty) {
            match place {
                Place::Inline => {
                    if owned.needs_drop {
                        // SAFETY: the scratch buffer holds a live `owned` value
                        unsafe { drop_fn(self.scratch.0.as_mut_ptr().cast()) };
                    }
                }
                // SAFETY: the heap allocation was leaked from a `Box` of `owned`
                Place::Heap(base) => unsafe { drop_fn(base.as_ptr()) },
            }
        }
    }
}

#[cold]
fn unreachable_unbound() -> ! {
    panic!("ValueSlot: unchecked access to an unbound slot")
}

impl Drop for ValueSlot<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ValueSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = match self.storage {
            Storage::Empty => "unbound",
            Storage::Borrowed(_) => "borrowed",
            Storage::Owned { place: Place::Inline, .. } => "inline",
            Storage::Owned { place: Place::Heap(_), .. } => "heap",
        };
        f.debug_struct("ValueSlot")
            .field("param", &self.param)
            .field("binding", &binding)
            .finish()
    }
}
