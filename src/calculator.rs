//! The solver: group resolution plus the iterative work-list recalc loop.

use fixedbitset::FixedBitSet;

use crate::error::SimError;
use crate::netlist::Netlist;
use crate::wire_state::WireState;
use crate::{FetIdx, WireIdx};

/// The iteration cap from the loading contract: a `recalc_*` call that hasn't
/// settled after this many passes is either oscillating or modelling a bug.
pub const STEP_LIMIT: u32 = 400;

/// Tunable knobs for a [`WireCalculator`]. The step limit is the only one —
/// there is no timeout or cancellation primitive (see the concurrency model).
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Maximum number of work-list passes per `recalc_*` call.
    pub step_limit: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            step_limit: STEP_LIMIT,
        }
    }
}

/// Diagnostic counters, incremented but never read by the solver itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    /// Number of times a wire was inserted into a connected group.
    pub num_add_wire_to_group: u64,
    /// Number of control-transistor edges walked while building groups.
    pub num_add_wire_transistor: u64,
    /// Number of wires that had `do_wire_recalc` run on them.
    pub num_wires_recalculated: u64,
}

/// The switch-network solver.
///
/// Owns the [`Netlist`] and the scratch buffers (group membership, the two
/// work-lists) that are reused across `recalc_*` calls to avoid reallocating
/// on every settle.
#[derive(Debug)]
pub struct WireCalculator {
    netlist: Netlist,
    config: SolverConfig,

    group_members: Vec<WireIdx>,
    group_marker: FixedBitSet,
    group_stack: Vec<WireIdx>,

    current: Vec<WireIdx>,
    current_marker: FixedBitSet,
    next: Vec<WireIdx>,
    next_marker: FixedBitSet,

    counters: Counters,
}

impl WireCalculator {
    /// Builds a calculator over `netlist` with the default [`SolverConfig`].
    pub fn new(netlist: Netlist) -> Self {
        Self::with_config(netlist, SolverConfig::default())
    }

    /// Builds a calculator over `netlist` with an explicit [`SolverConfig`].
    pub fn with_config(netlist: Netlist, config: SolverConfig) -> Self {
        let n = netlist.num_wires();
        WireCalculator {
            netlist,
            config,
            group_members: Vec::new(),
            group_marker: FixedBitSet::with_capacity(n),
            group_stack: Vec::new(),
            current: Vec::new(),
            current_marker: FixedBitSet::with_capacity(n),
            next: Vec::new(),
            next_marker: FixedBitSet::with_capacity(n),
            counters: Counters::default(),
        }
    }

    /// Read-only access to the underlying netlist (wire/transistor state,
    /// names, topology).
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// Mutable access to the underlying netlist, for pinning wires between
    /// recalcs. The calculator does not observe these writes until the next
    /// `recalc_*` call.
    pub fn netlist_mut(&mut self) -> &mut Netlist {
        &mut self.netlist
    }

    /// The diagnostic counters accumulated so far.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Seeds the work-list with every non-null wire and settles. Used only
    /// for the initial settle right after loading a netlist.
    pub fn recalc_all(&mut self) -> Result<(), SimError> {
        let seeds: Vec<WireIdx> = (0..self.netlist.num_wires())
            .map(WireIdx::from)
            .filter(|&w| !self.netlist.is_null_wire(w))
            .collect();
        self.recalc_wires(seeds, 0)
    }

    /// Seeds the work-list with `seeds` (wires that may have just changed)
    /// and propagates to a fixed point.
    ///
    /// `half_clock_count` only affects whether hitting the step limit raises
    /// [`SimError::DidNotConverge`]: it never raises when `half_clock_count
    /// == 0` (the initial settle tolerates one dirty pass).
    pub fn recalc_wires(
        &mut self,
        seeds: impl IntoIterator<Item = WireIdx>,
        half_clock_count: u32,
    ) -> Result<(), SimError> {
        self.current.clear();
        self.current_marker.clear();
        for w in seeds {
            if self.netlist.is_null_wire(w) {
                continue;
            }
            let i = usize::from(w);
            if !self.current_marker.contains(i) {
                self.current_marker.insert(i);
                self.current.push(w);
            }
        }
        self.do_recalc_iterations(half_clock_count)
    }

    fn do_recalc_iterations(&mut self, half_clock_count: u32) -> Result<(), SimError> {
        let mut step = 0u32;
        while !self.current.is_empty() {
            // `current.len()` is fixed for the duration of this pass: we only
            // ever push to `next`, never back onto `current`.
            let mut i = 0;
            while i < self.current.len() {
                let w = self.current[i];
                i += 1;
                self.do_wire_recalc(w);
                self.current_marker.set(usize::from(w), false);
            }
            std::mem::swap(&mut self.current, &mut self.next);
            std::mem::swap(&mut self.current_marker, &mut self.next_marker);
            self.next.clear();
            debug_assert_eq!(self.next_marker.count_ones(..), 0);

            step += 1;
            if self.current.is_empty() {
                break;
            }
            if step >= self.config.step_limit {
                log::warn!(
                    "wire calculator: step limit ({}) reached with {} wire(s) still pending",
                    self.config.step_limit,
                    self.current.len()
                );
                if half_clock_count > 0 {
                    return Err(SimError::DidNotConverge {
                        half_clock_count,
                        pending: self.current.len(),
                    });
                }
                log::debug!(
                    "wire calculator: non-convergence tolerated on the initial settle \
                     (half_clock_count == 0)"
                );
                break;
            }
        }
        Ok(())
    }

    fn enqueue_next(&mut self, w: WireIdx) {
        let i = usize::from(w);
        if !self.next_marker.contains(i) {
            self.next_marker.insert(i);
            self.next.push(w);
        }
    }

    /// Builds the maximal connected group reachable from `seed` through
    /// currently-conducting transistors (§ group construction), using an
    /// explicit stack rather than recursion — real chips produce groups
    /// spanning hundreds of wires.
    fn build_group(&mut self, seed: WireIdx) {
        self.group_members.clear();
        self.group_stack.clear();

        let vcc = self.netlist.vcc();
        let gnd = self.netlist.gnd();

        self.group_marker.insert(usize::from(seed));
        self.group_members.push(seed);
        self.counters.num_add_wire_to_group += 1;

        if seed == vcc || seed == gnd {
            return;
        }
        self.group_stack.push(seed);

        while let Some(w) = self.group_stack.pop() {
            for fet_idx in 0..self.netlist.control_transistors(w).len() {
                let fet: FetIdx = self.netlist.control_transistors(w)[fet_idx];
                self.counters.num_add_wire_transistor += 1;
                if !self.netlist.fet_gate_is_high(fet) {
                    continue;
                }
                let other = self.netlist.fet_other_side(fet, w);
                if self.group_marker.contains(usize::from(other)) {
                    continue;
                }
                self.group_marker.insert(usize::from(other));
                self.group_members.push(other);
                self.counters.num_add_wire_to_group += 1;
                if other == vcc || other == gnd {
                    continue;
                }
                self.group_stack.push(other);
            }
        }
    }

    /// Resolves the group built by the last [`Self::build_group`] call into
    /// the single state all of its non-rail members adopt.
    fn get_wire_value(&self) -> WireState {
        let vcc = self.netlist.vcc();
        let gnd = self.netlist.gnd();

        if self.group_marker.contains(usize::from(gnd)) {
            return WireState::GROUNDED;
        }
        if self.group_marker.contains(usize::from(vcc)) {
            return WireState::HIGH;
        }

        let mut value = self.netlist.state(self.group_members[0]);
        let mut saw_floating_low = false;
        let mut saw_floating_high = false;
        for &w in &self.group_members {
            let st = self.netlist.state(w);
            if st == WireState::FLOATING_LOW {
                saw_floating_low = true;
            }
            if st == WireState::FLOATING_HIGH {
                saw_floating_high = true;
            }
            let pulled = self.netlist.pulled(w);
            if pulled == WireState::PULLED_HIGH {
                value = WireState::PULLED_HIGH;
            } else if pulled == WireState::PULLED_LOW {
                value = WireState::PULLED_LOW;
            }
        }

        let still_floating = value == WireState::FLOATING_LOW || value == WireState::FLOATING_HIGH;
        if still_floating && saw_floating_low && saw_floating_high {
            let mut cap_low = 0usize;
            let mut cap_high = 0usize;
            for &w in &self.group_members {
                let st = self.netlist.state(w);
                if st != WireState::FLOATING_LOW && st != WireState::FLOATING_HIGH {
                    continue;
                }
                let cap =
                    self.netlist.control_transistors(w).len() + self.netlist.gate_transistors(w).len();
                if st == WireState::FLOATING_LOW {
                    cap_low += cap;
                } else {
                    cap_high += cap;
                }
            }
            value = if cap_high >= cap_low {
                WireState::FLOATING_HIGH
            } else {
                WireState::FLOATING_LOW
            };
        }

        value
    }

    /// Converts a just-disconnected wire to its residual (floating or
    /// still-pinned) state.
    ///
    /// A transistor gated by a member of the group being recalculated may
    /// have a rail directly on one of its sides (a pass gate straight to
    /// `VCC`/`VSS`, as in the charge-retention scenario); guard against
    /// floating the rail itself here rather than only at the call site, so
    /// every caller gets rail stability for free.
    fn float_wire(&mut self, w: WireIdx) {
        if w == self.netlist.vcc() || w == self.netlist.gnd() {
            return;
        }
        let pulled = self.netlist.pulled(w);
        if pulled == WireState::PULLED_HIGH {
            self.netlist.set_state(w, WireState::PULLED_HIGH);
            return;
        }
        if pulled == WireState::PULLED_LOW {
            self.netlist.set_state(w, WireState::PULLED_LOW);
            return;
        }

        let st = self.netlist.state(w);
        let mut new_state = st;
        // Two sequential `if`s, not `if`/`else if`, matching the source: a
        // wire cannot be in both states at once so the order only matters in
        // principle, but it's preserved for fidelity.
        if st == WireState::GROUNDED || st == WireState::PULLED_LOW {
            new_state = WireState::FLOATING_LOW;
        }
        if st == WireState::HIGH || st == WireState::PULLED_HIGH {
            new_state = WireState::FLOATING_HIGH;
        }
        self.netlist.set_state(w, new_state);
    }

    /// One step of the recalc loop: resolves `seed`'s group, writes the new
    /// state to every non-rail member, and flips/enqueues any transistor
    /// gated by one of them whose conduction state just changed.
    fn do_wire_recalc(&mut self, seed: WireIdx) {
        let vcc = self.netlist.vcc();
        let gnd = self.netlist.gnd();
        if seed == vcc || seed == gnd {
            return;
        }

        self.build_group(seed);
        self.counters.num_wires_recalculated += 1;

        let new_value = self.get_wire_value();
        let new_high = new_value.intersects(WireState::ANY_HIGH);

        // Take the group buffer so the loop body can freely call back into
        // `self` (clearing marker bits, writing netlist state) without
        // fighting the borrow checker; restored at the end for reuse.
        let members = std::mem::take(&mut self.group_members);
        for &w in &members {
            self.group_marker.set(usize::from(w), false);
            if w == vcc || w == gnd {
                continue;
            }
            self.netlist.set_state(w, new_value);

            let gate_fets: Vec<FetIdx> = self.netlist.gate_transistors(w).to_vec();
            for fet in gate_fets {
                let was_high = self.netlist.fet_gate_is_high(fet);
                if new_high && !was_high {
                    self.netlist.set_fet_gate_high(fet, true);
                    let s1 = self.netlist.fet_side1(fet);
                    let s2 = self.netlist.fet_side2(fet);
                    self.enqueue_next(s1);
                    self.enqueue_next(s2);
                } else if !new_high && was_high {
                    self.netlist.set_fet_gate_high(fet, false);
                    let s1 = self.netlist.fet_side1(fet);
                    let s2 = self.netlist.fet_side2(fet);
                    self.float_wire(s1);
                    self.float_wire(s2);
                    self.enqueue_next(s1);
                    self.enqueue_next(s2);
                }
            }
        }
        self.group_members = members;
    }
}
