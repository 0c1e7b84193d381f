//! The logical states a wire may hold, and the masks used to classify them.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A wire's logical state.
///
/// This is a bitmask, not a discriminant enum, because the solver needs to
/// test a state against a union of several of these values (`ANY_HIGH`,
/// `ANY_LOW`) on the hot recalc path. The exact bit values are part of the
/// contract (they're checked by [`WireState::intersects`] and friends) and
/// must not be renumbered.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct WireState(u8);

impl WireState {
    /// Pinned high by an external pullup or pad driver.
    pub const PULLED_HIGH: WireState = WireState(1);
    /// Pinned low by an external pulldown or pad driver.
    pub const PULLED_LOW: WireState = WireState(2);
    /// Driven low via a conducting path to the ground rail.
    pub const GROUNDED: WireState = WireState(4);
    /// Driven high via a conducting path to the supply rail.
    pub const HIGH: WireState = WireState(8);
    /// Isolated, retaining a high charge from the last time it was driven.
    pub const FLOATING_HIGH: WireState = WireState(16);
    /// Isolated, retaining a low charge from the last time it was driven.
    pub const FLOATING_LOW: WireState = WireState(32);
    /// Indeterminate initial state, before any settle has run.
    pub const FLOATING: WireState = WireState(64);

    /// Any state that reads as a logical high.
    pub const ANY_HIGH: WireState =
        WireState(Self::HIGH.0 | Self::PULLED_HIGH.0 | Self::FLOATING_HIGH.0);
    /// Any state that reads as a logical low.
    pub const ANY_LOW: WireState =
        WireState(Self::GROUNDED.0 | Self::PULLED_LOW.0 | Self::FLOATING_LOW.0);

    /// Builds a `WireState` from its raw bit value, as read off the wire.
    ///
    /// Exposed so a `CircuitLoader` or a caller reconstructing a wire from an
    /// external representation (e.g. the zero "no pull"/"indeterminate"
    /// state) doesn't need a constant for every possible combination.
    pub const fn from_bits(bits: u8) -> WireState {
        WireState(bits)
    }

    /// Returns the raw bit value, for storage in a flat array or snapshot.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if this state shares any bit with `mask` (e.g. `state.intersects(WireState::ANY_HIGH)`).
    pub fn intersects(self, mask: WireState) -> bool {
        (self.0 & mask.0) != 0
    }
}

impl BitOr for WireState {
    type Output = WireState;

    fn bitor(self, rhs: WireState) -> WireState {
        WireState(self.0 | rhs.0)
    }
}

impl BitOrAssign for WireState {
    fn bitor_assign(&mut self, rhs: WireState) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for WireState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            WireState::PULLED_HIGH => "PULLED_HIGH",
            WireState::PULLED_LOW => "PULLED_LOW",
            WireState::GROUNDED => "GROUNDED",
            WireState::HIGH => "HIGH",
            WireState::FLOATING_HIGH => "FLOATING_HIGH",
            WireState::FLOATING_LOW => "FLOATING_LOW",
            WireState::FLOATING => "FLOATING",
            _ => return write!(f, "WireState({:#x})", self.0),
        };
        f.write_str(name)
    }
}
