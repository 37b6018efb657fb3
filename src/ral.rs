//! A RAL-like module for DMA controller register access
//!
//! The controller's per-channel registers come in clusters: a status
//! pair for each channel thread, and a pointer / control block for each
//! channel. This module represents those clusters as arrays of structs,
//! and exposes them through the RAL macros where applicable.

#![allow(
    non_snake_case, // Compatibility with RAL
    unused, // Not every register has a user
)]

pub mod dmac;
pub mod thread;

pub use ral_registers::read_reg;
use ral_registers::{RORegister, RWRegister, WORegister};

//
// Helper types for static memory
//
// Similar to the RAL's `Instance` type, but more copy.
//

pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to static memory (peripheral memory)
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}
