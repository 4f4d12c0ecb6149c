//! Runtime heap configuration

/// Tunables fixed at heap setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Validate the header (range, canary, state, links) before every free.
    ///
    /// When disabled, freeing an invalid pointer is undefined behaviour.
    pub validate_frees: bool,

    /// Fill every fresh allocation with this byte (debug pattern).
    pub fill_on_alloc: Option<u8>,
}

impl HeapConfig {
    /// Hardened defaults: validate frees, no fill pattern.
    pub const DEFAULT: Self = Self {
        validate_frees: true,
        fill_on_alloc: None,
    };

    /// Skip free validation and pattern fills.
    pub const fn unchecked() -> Self {
        Self {
            validate_frees: false,
            fill_on_alloc: None,
        }
    }

    /// Return a copy that fills fresh allocations with `byte`.
    pub const fn with_fill(mut self, byte: u8) -> Self {
        self.fill_on_alloc = Some(byte);
        self
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
