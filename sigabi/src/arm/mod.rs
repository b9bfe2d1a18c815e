//! Signal ABI of the 32-bit arm guest.
//!
//! Layout and semantics mirror what the guest kernel does in its own
//! `sendsig`/`set_mcontext` path, so binaries that poke at the delivered
//! context keep working under emulation.

mod cpu;
mod mcontext;
mod sigframe;

pub use cpu::{CpuState, Cpsr, GReg, VfpState, MODE_USR};
pub use mcontext::{get_mcontext, set_mcontext, MContext, MContextVfp, McFlags, NGREG};
pub use sigframe::{get_mcontext_sigreturn, set_sigtramp_args, SigFrame, SigInfo};

/// arm instruction size in bytes.
pub const INSN_SIZE: u32 = 4;

/// Size of the signal trampoline code the host installs in the guest.
pub const SZSIGCODE: u32 = 9 * INSN_SIZE;

/// Minimum usable signal stack size.
pub const MINSIGSTKSZ: usize = 4 * 1024;

/// Recommended signal stack size.
pub const SIGSTKSZ: usize = MINSIGSTKSZ + 32768;

/// Top of the guest user address space.
pub const MAXUSER_ADDR: u32 = 0xbfc0_0000;

/// Guest address of the ps_strings record at the top of the user stack.
pub const PS_STRINGS_ADDR: u32 = MAXUSER_ADDR - 16;

/// Entry of the return trampoline, installed just below ps_strings.
pub const SIGTRAMP_ADDR: u32 = PS_STRINGS_ADDR - SZSIGCODE;
