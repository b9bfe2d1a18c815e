//! Register file of one emulated arm thread.

use core::ops::{Index, IndexMut};

bitflags! {
    /// Bits of the arm program status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cpsr: u32 {
        /// Processor mode field.
        const MODE = 0x1f;
        /// Thumb execution state.
        const T = 1 << 5;
        /// FIQ disable.
        const F = 1 << 6;
        /// IRQ disable.
        const I = 1 << 7;
        /// Imprecise-abort disable.
        const A = 1 << 8;
        /// Load/store endianness.
        const E = 1 << 9;
        /// Thumb-2 if/then state bits.
        const IT = 0x0600_fc00;
        /// SIMD greater-or-equal flags.
        const GE = 0xf << 16;
        /// Jazelle execution state.
        const J = 1 << 24;
        /// Sticky saturation flag.
        const Q = 1 << 27;
        /// Overflow flag.
        const V = 1 << 28;
        /// Carry flag.
        const C = 1 << 29;
        /// Zero flag.
        const Z = 1 << 30;
        /// Negative flag.
        const N = 1 << 31;
    }
}

impl Cpsr {
    /// Condition and SIMD bits a user context is allowed to change.
    pub const USER: Cpsr = Cpsr::N
        .union(Cpsr::Z)
        .union(Cpsr::C)
        .union(Cpsr::V)
        .union(Cpsr::Q)
        .union(Cpsr::GE);

    /// Execution-state bits committed alongside the user set on restore.
    pub const EXEC: Cpsr = Cpsr::T.union(Cpsr::IT).union(Cpsr::J);
}

/// Mode-field encoding of user mode.
pub const MODE_USR: u32 = 0x10;

/// Named general registers, in machine-context slot order.
#[allow(missing_docs)]
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GReg {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    Sp,
    Lr,
    Pc,
}

impl GReg {
    /// Frame pointer, an alias of r11.
    pub const FP: GReg = GReg::R11;

    /// Every register in slot order.
    pub const ALL: [GReg; 16] = [
        GReg::R0,
        GReg::R1,
        GReg::R2,
        GReg::R3,
        GReg::R4,
        GReg::R5,
        GReg::R6,
        GReg::R7,
        GReg::R8,
        GReg::R9,
        GReg::R10,
        GReg::R11,
        GReg::R12,
        GReg::Sp,
        GReg::Lr,
        GReg::Pc,
    ];

    /// Machine-context slot holding this register.
    #[inline]
    pub const fn slot(self) -> usize {
        self as usize
    }
}

/// VFP register bank.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfpState {
    /// d0-d31.
    pub dregs: [u64; 32],
    /// Floating-point status and control word.
    pub fpscr: u32,
}

/// Live register file of one emulated guest thread.
///
/// Mutated only by instruction execution and by [`set_mcontext`]
/// (restore); each guest thread owns its own copy.
///
/// [`set_mcontext`]: super::set_mcontext
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuState {
    /// r0-r15; r11 doubles as the frame pointer, r13-r15 are sp/lr/pc.
    pub regs: [u32; 16],
    /// Current program status word.
    pub cpsr: u32,
    /// Extended floating-point bank.
    pub vfp: VfpState,
}

impl CpuState {
    /// Creates a zeroed register file.
    #[inline]
    pub const fn new() -> Self {
        CpuState {
            regs: [0; 16],
            cpsr: 0,
            vfp: VfpState {
                dregs: [0; 32],
                fpscr: 0,
            },
        }
    }

    /// Reads the current status word.
    #[inline]
    pub const fn cpsr_read(&self) -> u32 {
        self.cpsr
    }

    /// Writes `value` into the status word, touching only the bits in `mask`.
    #[inline]
    pub fn cpsr_write(&mut self, value: u32, mask: Cpsr) {
        self.cpsr = (self.cpsr & !mask.bits()) | (value & mask.bits());
    }
}

impl Index<GReg> for CpuState {
    type Output = u32;

    #[inline]
    fn index(&self, index: GReg) -> &Self::Output {
        &self.regs[index.slot()]
    }
}

impl IndexMut<GReg> for CpuState {
    #[inline]
    fn index_mut(&mut self, index: GReg) -> &mut Self::Output {
        &mut self.regs[index.slot()]
    }
}
