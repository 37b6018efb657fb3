//! Channel microcode
//!
//! Each channel thread runs a small program that the manager thread starts
//! with `DMAGO`. The generator here expresses a [`Descriptor`] as such a
//! program: set the pointers and control register, loop over bursts, finish
//! any tail, then signal the channel's event.

use crate::{descriptor::Direction, Descriptor, Error, Result};

pub(crate) const DMAEND: u8 = 0x00;
pub(crate) const DMAKILL: u8 = 0x01;
const DMALD: u8 = 0x04;
const DMAST: u8 = 0x08;
const DMAWMB: u8 = 0x13;
const DMALP: u8 = 0x20;
const DMALDP: u8 = 0x25;
const DMASTP: u8 = 0x29;
const DMAWFP: u8 = 0x30;
const DMASEV: u8 = 0x34;
const DMAFLUSHP: u8 = 0x35;
const DMALPEND: u8 = 0x38;
pub(crate) const DMAGO: u8 = 0xA0;
const DMAMOV: u8 = 0xBC;

/// Size of a channel's program buffer, in bytes
pub const MICROCODE_SIZE: usize = 128;

/// Most iterations of a single loop
const LOOP_MAX: u32 = 256;

/// A channel program buffer
///
/// Aligned to the data cache line, so that cleaning the program never
/// touches unrelated data.
#[derive(Clone, Copy)]
#[repr(C, align(32))]
pub struct Microcode([u8; MICROCODE_SIZE]);

impl Microcode {
    pub(crate) const EMPTY: Self = Microcode([0; MICROCODE_SIZE]);

    /// Returns the program bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Program generation options set through [`Control`](crate::Control)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Mode {
    /// Service the peripheral with single requests, one per beat
    pub(crate) mono: bool,
    /// Skip peripheral handshaking
    pub(crate) crc: bool,
}

#[derive(Clone, Copy)]
enum Register {
    Sar = 0,
    Ccr = 1,
    Dar = 2,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Request {
    Single = 0,
    Burst = 1,
}

#[derive(Clone, Copy)]
enum LoopCounter {
    Lc0 = 0,
    Lc1 = 1,
}

/// Writes instructions into a program buffer
struct Assembler<'a> {
    program: &'a mut [u8],
    len: usize,
}

impl<'a> Assembler<'a> {
    fn new(program: &'a mut [u8]) -> Self {
        Assembler { program, len: 0 }
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.len + bytes.len();
        let slot = self.program.get_mut(self.len..end).ok_or(Error::Buffer)?;
        slot.copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    fn mov(&mut self, register: Register, value: u32) -> Result<()> {
        let [b0, b1, b2, b3] = value.to_le_bytes();
        self.emit(&[DMAMOV, register as u8, b0, b1, b2, b3])
    }

    /// Open a loop, returning the offset of its body
    fn lp(&mut self, counter: LoopCounter, iterations: u32) -> Result<usize> {
        debug_assert!((1..=LOOP_MAX).contains(&iterations));
        self.emit(&[DMALP | ((counter as u8) << 1), (iterations - 1) as u8])?;
        Ok(self.len)
    }

    /// Close the loop whose body starts at `body`
    fn lpend(&mut self, counter: LoopCounter, body: usize) -> Result<()> {
        let jump = self.len - body;
        self.emit(&[DMALPEND | ((counter as u8) << 2), jump as u8])
    }

    fn ld(&mut self) -> Result<()> {
        self.emit(&[DMALD])
    }

    fn st(&mut self) -> Result<()> {
        self.emit(&[DMAST])
    }

    fn ldp(&mut self, request: Request, peripheral: u8) -> Result<()> {
        self.emit(&[DMALDP | ((request as u8) << 1), peripheral << 3])
    }

    fn stp(&mut self, request: Request, peripheral: u8) -> Result<()> {
        self.emit(&[DMASTP | ((request as u8) << 1), peripheral << 3])
    }

    fn wfp(&mut self, request: Request, peripheral: u8) -> Result<()> {
        self.emit(&[DMAWFP | ((request as u8) << 1), peripheral << 3])
    }

    fn flushp(&mut self, peripheral: u8) -> Result<()> {
        self.emit(&[DMAFLUSHP, peripheral << 3])
    }

    fn wmb(&mut self) -> Result<()> {
        self.emit(&[DMAWMB])
    }

    fn sev(&mut self, event: usize) -> Result<()> {
        self.emit(&[DMASEV, (event as u8) << 3])
    }

    fn end(&mut self) -> Result<()> {
        self.emit(&[DMAEND])
    }
}

/// How each burst moves through the controller
#[derive(Clone, Copy)]
struct Burst {
    direction: Direction,
    handshake: bool,
    peripheral: u8,
}

impl Burst {
    fn emit(self, asm: &mut Assembler, request: Request) -> Result<()> {
        if !self.handshake {
            asm.ld()?;
            return asm.st();
        }
        asm.wfp(request, self.peripheral)?;
        match self.direction {
            Direction::DevToMem => {
                asm.ldp(request, self.peripheral)?;
                asm.st()
            }
            _ => {
                asm.ld()?;
                asm.stp(request, self.peripheral)
            }
        }
    }

    /// Emit `count` bursts, `count <= LOOP_MAX`
    fn repeat(self, asm: &mut Assembler, request: Request, count: u32) -> Result<()> {
        if count == 1 {
            return self.emit(asm, request);
        }
        let body = asm.lp(LoopCounter::Lc0, count)?;
        self.emit(asm, request)?;
        asm.lpend(LoopCounter::Lc0, body)
    }
}

/// Generate the program for `descriptor` into `program`
///
/// The program signals `event` when it's done. Returns the program length,
/// or [`Error::Buffer`] if the program doesn't fit.
pub(crate) fn generate(
    program: &mut Microcode,
    descriptor: &Descriptor,
    mode: Mode,
    event: usize,
) -> Result<usize> {
    let mut asm = Assembler::new(&mut program.0);

    let handshake = descriptor.direction.involves_device() && !mode.crc;
    let single = handshake && mode.mono;
    let burst = Burst {
        direction: descriptor.direction,
        handshake,
        peripheral: descriptor.peripheral as u8,
    };
    let request = if single {
        Request::Single
    } else {
        Request::Burst
    };

    let burst_len = if single { 1 } else { descriptor.burst_len };
    let beat = 1u32 << descriptor.dst_burst_size;
    let burst_bytes = beat * burst_len as u32;
    let mut bursts = descriptor.length / burst_bytes;
    let tail = (descriptor.length % burst_bytes) / beat;

    asm.mov(Register::Sar, descriptor.source_global)?;
    asm.mov(Register::Dar, descriptor.destination_global)?;
    asm.mov(Register::Ccr, descriptor.ccr(burst_len))?;
    if handshake {
        asm.flushp(burst.peripheral)?;
    }

    while bursts > 0 {
        let outer = (bursts / LOOP_MAX).min(LOOP_MAX);
        if outer == 0 {
            burst.repeat(&mut asm, request, bursts)?;
            break;
        }
        let outer_body = if outer > 1 {
            Some(asm.lp(LoopCounter::Lc1, outer)?)
        } else {
            None
        };
        let inner_body = asm.lp(LoopCounter::Lc0, LOOP_MAX)?;
        burst.emit(&mut asm, request)?;
        asm.lpend(LoopCounter::Lc0, inner_body)?;
        if let Some(body) = outer_body {
            asm.lpend(LoopCounter::Lc1, body)?;
        }
        bursts -= outer * LOOP_MAX;
    }

    if tail > 0 {
        if handshake {
            // Peripherals request the tail one beat at a time.
            asm.mov(Register::Ccr, descriptor.ccr(1))?;
            burst.repeat(&mut asm, Request::Single, tail)?;
        } else {
            asm.mov(Register::Ccr, descriptor.ccr(tail as u8))?;
            burst.emit(&mut asm, Request::Burst)?;
        }
    }

    asm.wmb()?;
    asm.sev(event)?;
    asm.end()?;
    Ok(asm.len)
}
