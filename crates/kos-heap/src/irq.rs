//! Interrupt masking around heap critical sections
//!
//! An interrupt handler that allocates while the interrupted code holds the
//! heap lock would spin forever on the same CPU. On bare-metal x86_64 the lock
//! is therefore only ever taken with interrupts disabled. Hosted builds (tests,
//! tools) have no interrupts to mask and run the closure directly.

/// True when this build masks interrupts around heap operations
pub const MASKS_INTERRUPTS: bool = cfg!(all(
    feature = "x86_64",
    target_arch = "x86_64",
    target_os = "none"
));

/// Run `f` with interrupts disabled, restoring the previous state afterwards.
#[cfg(all(feature = "x86_64", target_arch = "x86_64", target_os = "none"))]
#[inline]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    x86_64::instructions::interrupts::without_interrupts(f)
}

/// Run `f` directly; there are no interrupts to mask on this target.
#[cfg(not(all(feature = "x86_64", target_arch = "x86_64", target_os = "none")))]
#[inline]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}
