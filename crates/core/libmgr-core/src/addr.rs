//! Typed virtual address wrapper.
//!
//! The DSP address space is 32 bits wide and the firmware manifest stores
//! segment bases as `u32`, so [`VirtAddr`] wraps a `u32` rather than a
//! pointer-sized integer. Arithmetic is checked: an address that would wrap
//! past the top of the address space is a malformed manifest, not a value
//! to silently truncate.

use core::fmt;

/// A 32-bit virtual address in the DSP address space.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(u32);

impl VirtAddr {
    /// Creates a new `VirtAddr`.
    #[inline]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Returns the zero address.
    #[inline]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw `u32` value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the address as a `usize`.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Converts this address to a raw pointer.
    #[inline]
    pub const fn as_ptr<T>(self) -> *const T {
        self.0 as usize as *const T
    }

    /// Converts this address to a raw mutable pointer.
    #[inline]
    pub const fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as usize as *mut T
    }

    /// Returns `self + offset`, or `None` if the result leaves the 32-bit
    /// address space.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        if offset > u32::MAX as usize {
            return None;
        }
        match self.0.checked_add(offset as u32) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Returns `true` if the address is aligned to `align`.
    ///
    /// `align` must be a power of two.
    #[inline]
    pub const fn is_aligned(self, align: u32) -> bool {
        debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
        self.0 & (align - 1) == 0
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u32> for VirtAddr {
    fn from(addr: u32) -> Self {
        Self(addr)
    }
}
