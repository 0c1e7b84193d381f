//! [`SimulatorFacade`] — the thin public surface a chip driver talks to:
//! pin inputs high/low, trigger a recalc by wire name or index, read state.

use crate::calculator::{Counters, SolverConfig, WireCalculator};
use crate::error::SimError;
use crate::netlist::Netlist;
use crate::wire_state::WireState;
use crate::WireIdx;

/// The public entry point for a chip-driver collaborator.
///
/// Wraps a [`WireCalculator`] and exposes only the operations a driver needs:
/// pinning wires, triggering a settle, and reading back state. It never
/// mutates the netlist topology, and it never recalculates on its own — every
/// `set_*` call here is a pure write that a driver must follow with an
/// explicit `recalc_*` call once it has applied every pin change for this
/// half-clock.
#[derive(Debug)]
pub struct SimulatorFacade {
    calc: WireCalculator,
}

impl SimulatorFacade {
    /// Wraps a freshly loaded [`Netlist`] with the default [`SolverConfig`].
    pub fn new(netlist: Netlist) -> Self {
        Self {
            calc: WireCalculator::new(netlist),
        }
    }

    /// Wraps a freshly loaded [`Netlist`] with an explicit [`SolverConfig`].
    pub fn with_config(netlist: Netlist, config: SolverConfig) -> Self {
        Self {
            calc: WireCalculator::with_config(netlist, config),
        }
    }

    /// Read-only access to the underlying netlist (names, topology, current state).
    pub fn netlist(&self) -> &Netlist {
        self.calc.netlist()
    }

    /// The solver's diagnostic counters, accumulated since this facade was built.
    pub fn counters(&self) -> Counters {
        self.calc.counters()
    }

    /// Pins `wire[i]` high. Does not trigger a recalc.
    pub fn set_high(&mut self, i: WireIdx) {
        self.set_pulled(i, true);
    }

    /// Pins `wire[i]` low. Does not trigger a recalc.
    pub fn set_low(&mut self, i: WireIdx) {
        self.set_pulled(i, false);
    }

    /// Pins `wire[i]` high or low depending on `high`. Does not trigger a recalc.
    pub fn set_pulled(&mut self, i: WireIdx, high: bool) {
        let state = if high {
            WireState::PULLED_HIGH
        } else {
            WireState::PULLED_LOW
        };
        let netlist = self.calc.netlist_mut();
        netlist.set_pulled(i, state);
        netlist.set_state(i, state);
    }

    /// Pins the wire named `name` high. Does not trigger a recalc.
    ///
    /// # Errors
    /// [`SimError::UnknownWire`] if no wire has that name.
    pub fn set_high_wn(&mut self, name: &str) -> Result<(), SimError> {
        let i = self.wire_index_by_name(name)?;
        self.set_high(i);
        Ok(())
    }

    /// Pins the wire named `name` low. Does not trigger a recalc.
    ///
    /// # Errors
    /// [`SimError::UnknownWire`] if no wire has that name.
    pub fn set_low_wn(&mut self, name: &str) -> Result<(), SimError> {
        let i = self.wire_index_by_name(name)?;
        self.set_low(i);
        Ok(())
    }

    /// True if `wire[i]`'s current state reads as a logical high.
    pub fn is_high(&self, i: WireIdx) -> bool {
        self.calc.netlist().state(i).intersects(WireState::ANY_HIGH)
    }

    /// True if `wire[i]`'s current state reads as a logical low.
    pub fn is_low(&self, i: WireIdx) -> bool {
        self.calc.netlist().state(i).intersects(WireState::ANY_LOW)
    }

    /// Settles the network after pinning the wire named `name`.
    ///
    /// # Errors
    /// [`SimError::UnknownWire`] if no wire has that name; [`SimError::DidNotConverge`]
    /// per the solver's convergence policy.
    pub fn recalc_named_wire(&mut self, name: &str, half_clock_count: u32) -> Result<(), SimError> {
        let i = self.wire_index_by_name(name)?;
        self.calc.recalc_wires([i], half_clock_count)
    }

    /// Settles the network after pinning the given wires.
    ///
    /// # Errors
    /// [`SimError::DidNotConverge`] per the solver's convergence policy.
    pub fn recalc_wire_list(
        &mut self,
        wires: impl IntoIterator<Item = WireIdx>,
        half_clock_count: u32,
    ) -> Result<(), SimError> {
        self.calc.recalc_wires(wires, half_clock_count)
    }

    /// Initial-condition settle: seeds every non-null wire. Tolerates
    /// non-convergence (logs and keeps the partial state) since real
    /// netlists commonly need a dirty first pass before inputs are applied.
    pub fn recalc_all(&mut self) -> Result<(), SimError> {
        self.calc.recalc_all()
    }

    /// Snapshot copy of every wire's current state, indexed by [`WireIdx`].
    pub fn get_wires_state(&self) -> Vec<WireState> {
        self.calc.netlist().get_wires_state()
    }

    fn wire_index_by_name(&self, name: &str) -> Result<WireIdx, SimError> {
        self.calc
            .netlist()
            .wire_index_by_name(name)
            .ok_or_else(|| SimError::unknown_wire(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetlistBuilder;

    fn inverter() -> SimulatorFacade {
        let mut b = NetlistBuilder::new();
        b.add_wire("VCC", WireState::from_bits(0));
        let vss = b.add_wire("VSS", WireState::from_bits(0));
        let a = b.add_wire("A", WireState::PULLED_LOW);
        let out = b.add_wire("OUT", WireState::PULLED_HIGH);
        b.add_fet(a, out, vss);
        SimulatorFacade::new(b.build().unwrap())
    }

    #[test]
    fn inverter_via_name_and_index_agree() {
        let mut sim = inverter();
        sim.recalc_all().unwrap();
        let out = sim.netlist().wire_index_by_name("OUT").unwrap();
        assert!(sim.is_high(out));

        sim.set_high_wn("A").unwrap();
        sim.recalc_named_wire("A", 1).unwrap();
        assert!(sim.is_low(out));
    }

    #[test]
    fn unknown_wire_name_errors() {
        let mut sim = inverter();
        let err = sim.set_high_wn("nonexistent").unwrap_err();
        assert!(matches!(err, SimError::UnknownWire { .. }));
    }

    #[test]
    fn set_pulled_does_not_trigger_a_recalc() {
        let mut sim = inverter();
        sim.recalc_all().unwrap();
        let out = sim.netlist().wire_index_by_name("OUT").unwrap();
        let before = sim.get_wires_state();

        sim.set_high_wn("A").unwrap();
        // No recalc yet: OUT must be unchanged.
        let after = sim.get_wires_state();
        assert_eq!(before[usize::from(out)].bits(), after[usize::from(out)].bits());
    }

    #[test]
    fn get_wires_state_is_a_snapshot() {
        let mut sim = inverter();
        sim.recalc_all().unwrap();
        let snap = sim.get_wires_state();
        assert_eq!(snap.len(), sim.netlist().num_wires());
    }
}
