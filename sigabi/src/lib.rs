//! Guest signal ABI support for the user-mode emulator.
//!
//! When the dispatch layer delivers a signal to an emulated program it has to
//! hand the guest handler a machine context laid out exactly as the guest
//! kernel would have written it, and on sigreturn it has to rebuild the
//! emulated register file from a context the guest may have edited in place.
//! This crate owns that boundary: the wire-format context structs, the
//! capture/restore codec with its mode validation, and the register setup for
//! entering a handler through the host-installed trampoline.
//!
//! Signal queueing, siginfo translation and frame allocation stay in the
//! dispatch layer; every operation here works on one thread's register file
//! and a frame the caller has already pinned.
#![no_std]
#![deny(missing_docs)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;

mod error;

pub mod arm;

pub use error::TargetError;
