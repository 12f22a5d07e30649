//! # void_core - Void Reflect Core
//!
//! Zero-dependency type descriptor service used by the reflection engine.
//! Provides:
//! - **Identity**: stable type ids and readable names for reflected types
//! - **Casting**: safe pointer casts from a type to its statically-related bases
//! - **Enumerations**: access to the integral representation of fieldless enums
//! - **Hashing**: optional erased hashing of reflected values
//!
//! The reflection engine never constructs this service itself; each
//! reflected type supplies it through its [`Reflect`] implementation.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

pub mod rtti;

pub use rtti::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::rtti::{BaseType, HashFn, Reflect, TypeInfo, Underlying};
    pub use crate::base_type;
}
