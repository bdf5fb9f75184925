use serde::{Deserialize, Serialize};

/// Number of distinct job colors a renderer must provide.
///
/// Job color indices wrap modulo this value.
pub const PALETTE_SIZE: usize = 20;

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    /// Fill for a job bar; the index is always `< PALETTE_SIZE`.
    Job(u8),
    SetupFill,
    SetupBorder,
    BarBorder,

    RowBandEven,
    RowBandOdd,
    RowLabel,

    AxisBackground,
    AxisTick,
    GridLine,

    TextPrimary,
    TextMuted,

    Background,
}

impl ThemeToken {
    /// Token for a palette slot, wrapping out-of-range indices.
    pub fn job(color_index: usize) -> Self {
        Self::Job((color_index % PALETTE_SIZE) as u8)
    }
}
