/// Errno-valued failure reported back to the guest.
///
/// The syscall layer hands these to the guest in negative form, so the codes
/// follow the guest kernel's errno table. Context validation only ever
/// produces [`TargetError::EINVAL`]; the neighbouring codes are carried for
/// the dispatch layer, which reports frame-copy faults through the same
/// channel.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetError {
    /// Operation not permitted
    EPERM = 1,
    /// Bad address
    EFAULT = 14,
    /// Invalid argument
    EINVAL = 22,
}

impl TargetError {
    /// Human readable message for the code.
    pub const fn as_str(&self) -> &'static str {
        use self::TargetError::*;
        match self {
            EPERM => "Operation not permitted",
            EFAULT => "Bad address",
            EINVAL => "Invalid argument",
        }
    }

    /// Negative errno form, as returned to the guest.
    pub const fn code(self) -> isize {
        -(self as isize)
    }
}
