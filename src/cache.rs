//! Data cache maintenance around transfers
//!
//! The controller reads and writes physical memory, and never sees the
//! CPU's data cache. Before a transfer, dirty source lines go out to memory
//! and destination lines are dropped, so that an eviction can't overwrite
//! what the controller writes. After a transfer (or an abort) the
//! destination is dropped again, since the CPU may have speculatively
//! refilled it while the transfer ran.

use crate::{descriptor::Direction, microcode::Microcode, Descriptor, Platform};

/// Write back the source buffer, if it's memory
pub(crate) fn clean_source<P: Platform>(platform: &mut P, descriptor: &Descriptor) {
    if matches!(
        descriptor.direction,
        Direction::MemToMem | Direction::MemToDev
    ) {
        platform.clean_dcache(descriptor.source, descriptor.length as usize);
    }
}

/// Discard the destination buffer, if it's memory
pub(crate) fn invalidate_destination<P: Platform>(platform: &mut P, descriptor: &Descriptor) {
    if matches!(
        descriptor.direction,
        Direction::MemToMem | Direction::DevToMem
    ) && descriptor.length != 0
    {
        platform.invalidate_dcache(descriptor.destination, descriptor.length as usize);
    }
}

/// Write back a generated program, since the controller fetches it from memory
pub(crate) fn clean_program<P: Platform>(platform: &mut P, program: &Microcode) {
    let bytes = program.as_bytes();
    platform.clean_dcache(bytes.as_ptr() as usize, bytes.len());
}

/// Write back a caller's program
pub(crate) fn clean_user_program<P: Platform>(platform: &mut P, program: &[u8]) {
    platform.clean_dcache(program.as_ptr() as usize, program.len());
}
