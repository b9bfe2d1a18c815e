//! Machine-context capture and restore.
//!
//! The wire structs here are byte-compatible with the guest kernel's
//! `mcontext_t` and its out-of-line VFP record, so a guest that inspects or
//! rewrites the delivered context sees exactly what its own kernel would
//! have produced.

use core::mem::size_of;

use super::cpu::{CpuState, Cpsr, GReg, MODE_USR};
use crate::TargetError;

/// Number of live slots in [`MContext`] (r0-r15 plus the status word).
pub const NGREG: usize = 17;

/// Slot holding the status word.
const SLOT_CPSR: usize = 16;

/// The guest is little-endian; slots move between host and guest byte order
/// through these. Identity on little-endian hosts.
#[inline]
const fn tswap32(v: u32) -> u32 {
    v.to_le()
}

#[inline]
const fn tswap64(v: u64) -> u64 {
    v.to_le()
}

bitflags! {
    /// Capture flags accepted by [`get_mcontext`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct McFlags: u32 {
        /// Capture at a restartable syscall boundary: store a zeroed return
        /// register and a cleared carry bit so the restored context resumes
        /// as if the syscall had not returned yet.
        const CLEAR_RET = 0x0001;
    }
}

/// Out-of-line VFP extension record.
///
/// Fields hold guest byte order; the codec swaps on the way in and out.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct MContextVfp {
    /// d0-d31.
    pub dregs: [u64; 32],
    /// Floating-point status and control word.
    pub fpscr: u32,
}

impl MContextVfp {
    /// Creates a zeroed record.
    pub const fn zeroed() -> Self {
        MContextVfp {
            dregs: [0; 32],
            fpscr: 0,
        }
    }
}

/// Machine context in the guest kernel's on-wire layout.
///
/// 32 general-register slots (only [`NGREG`] are live), the declared size of
/// the VFP extension, a guest pointer to it, and reserved padding that keeps
/// the struct the same size as the guest kernel's. Slots are private so every
/// access goes through the named-register accessors; raw indices drifting
/// between capture and restore is how this layout gets corrupted.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct MContext {
    gregs: [u32; 32],
    vfp_size: i32,
    vfp_ptr: u32,
    spare: [i32; 33],
}

impl MContext {
    /// Creates a zeroed context with no VFP extension declared.
    pub const fn zeroed() -> Self {
        MContext {
            gregs: [0; 32],
            vfp_size: 0,
            vfp_ptr: 0,
            spare: [0; 33],
        }
    }

    /// Reads a general-register slot.
    #[inline]
    pub const fn greg(&self, r: GReg) -> u32 {
        tswap32(self.gregs[r.slot()])
    }

    /// Writes a general-register slot.
    #[inline]
    pub fn set_greg(&mut self, r: GReg, value: u32) {
        self.gregs[r.slot()] = tswap32(value);
    }

    /// Reads the status-word slot.
    #[inline]
    pub const fn cpsr(&self) -> u32 {
        tswap32(self.gregs[SLOT_CPSR])
    }

    /// Writes the status-word slot.
    #[inline]
    pub fn set_cpsr(&mut self, value: u32) {
        self.gregs[SLOT_CPSR] = tswap32(value);
    }

    /// Declared size of the VFP extension; zero means not present.
    #[inline]
    pub const fn vfp_size(&self) -> i32 {
        tswap32(self.vfp_size as u32) as i32
    }

    /// Declares the VFP extension size.
    #[inline]
    pub fn set_vfp_size(&mut self, size: i32) {
        self.vfp_size = tswap32(size as u32) as i32;
    }

    /// Guest address of the out-of-line VFP record.
    #[inline]
    pub const fn vfp_ptr(&self) -> u32 {
        tswap32(self.vfp_ptr)
    }

    /// Points the context at its out-of-line VFP record.
    #[inline]
    pub fn set_vfp_ptr(&mut self, addr: u32) {
        self.vfp_ptr = tswap32(addr);
    }
}

/// True when the declared VFP size is neither absent nor exactly one record.
#[inline]
fn vfp_size_invalid(mcp: &MContext) -> bool {
    mcp.vfp_size() != 0 && mcp.vfp_size() as usize != size_of::<MContextVfp>()
}

/// Serializes the register file into `mcp`.
///
/// The VFP bank is copied into `vfp` when the context declares the extension
/// and the dispatch layer resolved its guest pointer to a pinned buffer.
/// Never mutates the register file; the only failure is a declared VFP size
/// that matches no known record.
pub fn get_mcontext(
    env: &CpuState,
    mcp: &mut MContext,
    flags: McFlags,
    vfp: Option<&mut MContextVfp>,
) -> Result<(), TargetError> {
    if vfp_size_invalid(mcp) {
        debug!("get_mcontext: bad vfp size {}", mcp.vfp_size());
        return Err(TargetError::EINVAL);
    }

    if flags.contains(McFlags::CLEAR_RET) {
        mcp.set_greg(GReg::R0, 0);
        mcp.set_cpsr(env.cpsr_read() & !Cpsr::C.bits());
    } else {
        mcp.set_greg(GReg::R0, env[GReg::R0]);
        mcp.set_cpsr(env.cpsr_read());
    }

    for &r in &GReg::ALL[1..] {
        mcp.set_greg(r, env[r]);
    }

    if mcp.vfp_size() != 0 {
        if let Some(out) = vfp {
            for (lane, dreg) in out.dregs.iter_mut().zip(env.vfp.dregs.iter()) {
                *lane = tswap64(*dreg);
            }
            out.fpscr = tswap32(env.vfp.fpscr);
        }
    }
    Ok(())
}

/// Checks a context the guest may have edited, before anything is committed.
///
/// Returns the status word to commit. A guest may flip condition and SIMD
/// flags, nothing else: it must stay in user mode, must not mask interrupts,
/// and the thumb bit has to agree with the low bit of the program counter
/// (the two encode the same fact, so disagreement means the context is
/// corrupt or hostile).
fn validate_mcontext(env: &CpuState, mcp: &MContext) -> Result<u32, TargetError> {
    if vfp_size_invalid(mcp) {
        debug!("set_mcontext: bad vfp size {}", mcp.vfp_size());
        return Err(TargetError::EINVAL);
    }

    let ccpsr = env.cpsr_read();
    let cpsr = mcp.cpsr();

    if (ccpsr ^ cpsr) & !Cpsr::USER.bits() != 0 {
        debug!(
            "set_mcontext: non-user cpsr change {:#010x} -> {:#010x}",
            ccpsr, cpsr
        );
        return Err(TargetError::EINVAL);
    }
    if cpsr & Cpsr::MODE.bits() != MODE_USR
        || cpsr & (Cpsr::I.bits() | Cpsr::F.bits()) != 0
    {
        debug!("set_mcontext: privileged cpsr {:#010x}", cpsr);
        return Err(TargetError::EINVAL);
    }
    if (mcp.greg(GReg::Pc) & 1 != 0) != (cpsr & Cpsr::T.bits() != 0) {
        debug!(
            "set_mcontext: thumb bit disagrees with pc {:#010x}",
            mcp.greg(GReg::Pc)
        );
        return Err(TargetError::EINVAL);
    }

    Ok(cpsr)
}

/// Restores the register file from a validated context.
///
/// All checks run before the first register write, so a rejected context
/// leaves the register file exactly as it was. When the VFP extension is
/// absent the floating-point bank is left untouched. The status word is
/// committed last through the masked [`CpuState::cpsr_write`] primitive.
/// `srflag` is part of the guest ABI but unused by this architecture.
pub fn set_mcontext(
    env: &mut CpuState,
    mcp: &MContext,
    _srflag: i32,
    vfp: Option<&MContextVfp>,
) -> Result<(), TargetError> {
    let cpsr = validate_mcontext(env, mcp)?;

    for &r in &GReg::ALL {
        env[r] = mcp.greg(r);
    }

    if mcp.vfp_size() != 0 {
        if let Some(vfp) = vfp {
            for (dreg, lane) in env.vfp.dregs.iter_mut().zip(vfp.dregs.iter()) {
                *dreg = tswap64(*lane);
            }
            env.vfp.fpscr = tswap32(vfp.fpscr);
            // The guest kernel's context carries no FPEXC/FPINST state, so
            // none is restored here either.
        }
    }

    env.cpsr_write(cpsr, Cpsr::USER.union(Cpsr::EXEC));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_env() -> CpuState {
        let mut env = CpuState::new();
        for (i, reg) in env.regs.iter_mut().enumerate() {
            *reg = 0x1000 + (i as u32) * 0x11;
        }
        // Even pc, user mode, a couple of condition flags set.
        env[GReg::Pc] = 0x0001_0040;
        env.cpsr = MODE_USR | Cpsr::Z.bits() | Cpsr::C.bits();
        for (i, dreg) in env.vfp.dregs.iter_mut().enumerate() {
            *dreg = 0x0123_4567_89ab_cdef ^ (i as u64);
        }
        env.vfp.fpscr = 0x0009_0000;
        env
    }

    #[test]
    fn wire_layout_matches_guest_kernel() {
        assert_eq!(size_of::<MContext>(), 268);
        assert_eq!(size_of::<MContextVfp>(), 264);
    }

    #[test]
    fn capture_restore_round_trip() {
        let env = sample_env();
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), None).unwrap();

        let mut restored = sample_env();
        restored.regs = [0; 16];
        set_mcontext(&mut restored, &mcp, 0, None).unwrap();
        assert_eq!(restored, env);
    }

    #[test]
    fn clear_ret_touches_only_r0_and_carry() {
        let env = sample_env();
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::CLEAR_RET, None).unwrap();

        assert_eq!(mcp.greg(GReg::R0), 0);
        assert_eq!(mcp.cpsr(), env.cpsr & !Cpsr::C.bits());
        for &r in &GReg::ALL[1..] {
            assert_eq!(mcp.greg(r), env[r]);
        }
    }

    #[test]
    fn capture_rejects_bad_vfp_size() {
        let env = sample_env();
        let mut mcp = MContext::zeroed();
        mcp.set_vfp_size(8);
        assert_eq!(
            get_mcontext(&env, &mut mcp, McFlags::empty(), None),
            Err(TargetError::EINVAL)
        );
    }

    #[test]
    fn restore_rejects_bad_vfp_size() {
        let env = sample_env();
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), None).unwrap();
        mcp.set_vfp_size(size_of::<MContextVfp>() as i32 - 4);

        let mut target = sample_env();
        let before = target.clone();
        assert_eq!(set_mcontext(&mut target, &mcp, 0, None), Err(TargetError::EINVAL));
        assert_eq!(target, before);
    }

    #[test]
    fn restore_rejects_non_user_bit_change() {
        let env = sample_env();
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), None).unwrap();
        // Flipping the endianness bit is outside the user-writable set.
        mcp.set_cpsr(env.cpsr | Cpsr::E.bits());

        let mut target = sample_env();
        let before = target.clone();
        assert_eq!(set_mcontext(&mut target, &mcp, 0, None), Err(TargetError::EINVAL));
        assert_eq!(target, before);
    }

    #[test]
    fn restore_rejects_masked_interrupts() {
        // The live status word already has IRQs masked, so the incoming one
        // passes the unchanged-bits check and must be caught by the mode
        // check instead.
        let mut env = sample_env();
        env.cpsr = MODE_USR | Cpsr::I.bits();
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), None).unwrap();

        let before = env.clone();
        assert_eq!(set_mcontext(&mut env, &mcp, 0, None), Err(TargetError::EINVAL));
        assert_eq!(env, before);
    }

    #[test]
    fn restore_rejects_privileged_mode() {
        let mut env = sample_env();
        env.cpsr = 0x13; // supervisor
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), None).unwrap();

        assert_eq!(set_mcontext(&mut env, &mcp, 0, None), Err(TargetError::EINVAL));
    }

    #[test]
    fn restore_rejects_thumb_pc_mismatch() {
        let mut env = sample_env();
        env.cpsr |= Cpsr::T.bits();
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), None).unwrap();
        // T set but an arm-aligned pc: the redundant encodings disagree.
        assert_eq!(mcp.greg(GReg::Pc) & 1, 0);

        let before = env.clone();
        assert_eq!(set_mcontext(&mut env, &mcp, 0, None), Err(TargetError::EINVAL));
        assert_eq!(env, before);

        // With the pc's low bit matching, the same context restores fine.
        mcp.set_greg(GReg::Pc, env[GReg::Pc] | 1);
        set_mcontext(&mut env, &mcp, 0, None).unwrap();
        assert_eq!(env[GReg::Pc], before[GReg::Pc] | 1);
    }

    #[test]
    fn vfp_round_trip() {
        let env = sample_env();
        let mut mcp = MContext::zeroed();
        mcp.set_vfp_size(size_of::<MContextVfp>() as i32);
        let mut rec = MContextVfp::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), Some(&mut rec)).unwrap();

        let mut restored = sample_env();
        restored.vfp.dregs = [0; 32];
        restored.vfp.fpscr = 0;
        set_mcontext(&mut restored, &mcp, 0, Some(&rec)).unwrap();
        assert_eq!(restored.vfp, env.vfp);
    }

    #[test]
    fn absent_vfp_leaves_bank_untouched() {
        let env = sample_env();
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), None).unwrap();

        let mut target = sample_env();
        target.vfp.dregs[7] = 0x7777_7777_7777_7777;
        target.vfp.fpscr = 0xffff_0000;
        let vfp_before = target.vfp.clone();
        set_mcontext(&mut target, &mcp, 0, None).unwrap();
        assert_eq!(target.vfp, vfp_before);
    }

    #[test]
    fn restore_flag_is_inert() {
        let env = sample_env();
        let mut mcp = MContext::zeroed();
        get_mcontext(&env, &mut mcp, McFlags::empty(), None).unwrap();

        let mut a = sample_env();
        let mut b = sample_env();
        set_mcontext(&mut a, &mcp, 0, None).unwrap();
        set_mcontext(&mut b, &mcp, 1, None).unwrap();
        assert_eq!(a, b);
    }
}
