//! Signal frame layout and handler entry.

use core::mem::offset_of;

use super::cpu::{CpuState, Cpsr, GReg};
use super::mcontext::{MContext, MContextVfp};
use super::SIGTRAMP_ADDR;
use crate::TargetError;

/// Signal information record delivered alongside the context.
///
/// The payload is produced by the siginfo translation layer; this crate only
/// cares about its size and placement within the frame.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SigInfo {
    /// Signal number.
    pub si_signo: i32,
    /// Associated errno.
    pub si_errno: i32,
    /// Signal-specific code.
    pub si_code: i32,
    /// Sending process.
    pub si_pid: i32,
    /// Real uid of the sender.
    pub si_uid: u32,
    /// Exit value or signal.
    pub si_status: i32,
    /// Faulting guest address.
    pub si_addr: u32,
    /// Signal value.
    pub si_value: u32,
    _reason: [i32; 8],
}

impl SigInfo {
    /// Creates a zeroed record.
    pub const fn zeroed() -> Self {
        SigInfo {
            si_signo: 0,
            si_errno: 0,
            si_code: 0,
            si_pid: 0,
            si_uid: 0,
            si_status: 0,
            si_addr: 0,
            si_value: 0,
            _reason: [0; 8],
        }
    }
}

/// One delivered signal frame, as laid out on the guest stack.
///
/// The machine context sits at the frame base, which is what keeps
/// [`get_mcontext_sigreturn`] an identity mapping. `vfp` is the inline home
/// of the out-of-line extension; the dispatch layer points the context's VFP
/// pointer at it when it attaches the extension.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct SigFrame {
    /// Machine context consumed once by sigreturn.
    pub mctx: MContext,
    /// Saved signal information.
    pub si: SigInfo,
    /// Inline storage for the VFP extension record.
    pub vfp: MContextVfp,
}

impl SigFrame {
    /// Offset of the machine context within the frame.
    pub const MCTX_OFFSET: usize = offset_of!(SigFrame, mctx);
    /// Offset of the signal information record within the frame.
    pub const SIGINFO_OFFSET: usize = offset_of!(SigFrame, si);
    /// Offset of the inline VFP extension record.
    pub const VFP_OFFSET: usize = offset_of!(SigFrame, vfp);

    /// Creates a zeroed frame.
    pub const fn zeroed() -> Self {
        SigFrame {
            mctx: MContext::zeroed(),
            si: SigInfo::zeroed(),
            vfp: MContextVfp::zeroed(),
        }
    }
}

/// Sets up the register file to enter a guest signal handler.
///
/// Arguments land in r0-r2 (signal number, siginfo address, context
/// address); r5 carries the context address a second time because the return
/// trampoline cannot recompute it. The stack pointer is left at the frame
/// base and the link register at the trampoline entry, so a plain handler
/// return triggers the sigreturn path. Bit 0 of the handler address selects
/// the instruction set: the pc is entered with it masked off and the thumb
/// state bit set to match. Cannot fail.
pub fn set_sigtramp_args(
    env: &mut CpuState,
    sig: i32,
    frame_addr: u32,
    siginfo_off: u32,
    mctx_off: u32,
    handler: u32,
) -> Result<(), TargetError> {
    debug!(
        "sigtramp args @ sig: {}, frame: {:#x}, handler: {:#x}",
        sig, frame_addr, handler
    );

    env[GReg::R0] = sig as u32;
    env[GReg::R1] = frame_addr + siginfo_off;
    env[GReg::R2] = frame_addr + mctx_off;
    env[GReg::R5] = frame_addr + mctx_off;
    env[GReg::Pc] = handler & !1;
    env[GReg::Sp] = frame_addr;
    env[GReg::Lr] = SIGTRAMP_ADDR;
    env.cpsr_write((handler & 1) * Cpsr::T.bits(), Cpsr::T);

    Ok(())
}

/// Maps a delivered frame address to the machine context inside it.
///
/// The context sits at the frame base on arm, so this is the identity;
/// sibling architectures put siginfo first and resolve through an offset,
/// which is why the sigreturn path asks instead of assuming.
#[inline]
pub fn get_mcontext_sigreturn(frame_addr: u32) -> u32 {
    frame_addr
}
