//! Flat-array netlist storage: wires, transistors, and the name → index map.
//!
//! Laid out as struct-of-arrays rather than a graph of owned objects so the
//! solver's hot loops (group flood-fill, recalc) walk contiguous memory
//! instead of chasing pointers — see the design notes on cache behaviour.

use ahash::{HashMap, HashMapExt};
use fixedbitset::FixedBitSet;

use crate::error::SimError;
use crate::wire_state::WireState;
use crate::{FetIdx, WireIdx};

/// A read-only snapshot of one wire's record, for inspection.
///
/// The solver itself never materializes these on the hot path; it reads the
/// backing arrays in [`Netlist`] directly.
#[derive(Debug, Clone)]
pub struct Wire {
    /// This wire's own index.
    pub index: WireIdx,
    /// The wire's name, or empty if unnamed.
    pub name: String,
    /// External pull: `PULLED_HIGH`, `PULLED_LOW`, or the zero state.
    pub pulled: WireState,
    /// Current settled state.
    pub state: WireState,
    /// Transistors whose channel includes this wire.
    pub control_transistors: Vec<FetIdx>,
    /// Transistors whose gate this wire drives.
    pub gate_transistors: Vec<FetIdx>,
}

/// A read-only snapshot of one transistor's record.
#[derive(Debug, Clone, Copy)]
pub struct Fet {
    /// This transistor's own index.
    pub index: FetIdx,
    /// The wire driving this transistor's gate.
    pub gate: WireIdx,
    /// One channel terminal (symmetric with `side2`).
    pub side1: WireIdx,
    /// The other channel terminal (symmetric with `side1`).
    pub side2: WireIdx,
    /// Whether the transistor is currently conducting.
    pub gate_high: bool,
}

/// Flat-array storage for a loaded circuit.
///
/// Built once by [`NetlistBuilder::build`] and then mutated only through
/// `pulled`, `state`, and the transistors' gate-state bit — the topology
/// (adjacency, names, wire/transistor count) is immutable after load.
#[derive(Debug)]
pub struct Netlist {
    vcc: WireIdx,
    gnd: WireIdx,

    wire_null: FixedBitSet,
    wire_name: Vec<String>,
    wire_pulled: Vec<WireState>,
    wire_state: Vec<WireState>,
    control_offsets: Vec<u32>,
    control_ids: Vec<FetIdx>,
    gate_offsets: Vec<u32>,
    gate_ids: Vec<FetIdx>,

    fet_null: FixedBitSet,
    fet_side1: Vec<WireIdx>,
    fet_side2: Vec<WireIdx>,
    fet_gate: Vec<WireIdx>,
    fet_gate_high: FixedBitSet,

    name_to_idx: HashMap<String, WireIdx>,
}

impl Netlist {
    /// Number of wire slots, including null ones.
    pub fn num_wires(&self) -> usize {
        self.wire_name.len()
    }

    /// Number of transistor slots, including null ones.
    pub fn num_fets(&self) -> usize {
        self.fet_side1.len()
    }

    /// The permanently-high supply rail.
    pub fn vcc(&self) -> WireIdx {
        self.vcc
    }

    /// The permanently-grounded rail.
    pub fn gnd(&self) -> WireIdx {
        self.gnd
    }

    /// Looks up a wire by its name.
    pub fn wire_index_by_name(&self, name: &str) -> Option<WireIdx> {
        self.name_to_idx.get(name).copied()
    }

    /// Builds a read-only snapshot of a wire's record.
    pub fn wire(&self, idx: WireIdx) -> Option<Wire> {
        if self.is_null_wire(idx) {
            return None;
        }
        let i = usize::from(idx);
        Some(Wire {
            index: idx,
            name: self.wire_name[i].clone(),
            pulled: self.wire_pulled[i],
            state: self.wire_state[i],
            control_transistors: self.control_transistors(idx).to_vec(),
            gate_transistors: self.gate_transistors(idx).to_vec(),
        })
    }

    /// Builds a read-only snapshot of a transistor's record.
    pub fn fet(&self, idx: FetIdx) -> Option<Fet> {
        if self.is_null_fet(idx) {
            return None;
        }
        let i = usize::from(idx);
        Some(Fet {
            index: idx,
            gate: self.fet_gate[i],
            side1: self.fet_side1[i],
            side2: self.fet_side2[i],
            gate_high: self.fet_gate_high.contains(i),
        })
    }

    /// Snapshot of every wire's current state, indexed by [`WireIdx`].
    pub fn get_wires_state(&self) -> Vec<WireState> {
        self.wire_state.clone()
    }

    pub(crate) fn is_null_wire(&self, idx: WireIdx) -> bool {
        idx.is_null() || self.wire_null.contains(usize::from(idx))
    }

    pub(crate) fn is_null_fet(&self, idx: FetIdx) -> bool {
        idx.is_null() || self.fet_null.contains(usize::from(idx))
    }

    pub(crate) fn control_transistors(&self, idx: WireIdx) -> &[FetIdx] {
        let i = usize::from(idx);
        let start = self.control_offsets[i] as usize;
        let end = self.control_offsets[i + 1] as usize;
        &self.control_ids[start..end]
    }

    pub(crate) fn gate_transistors(&self, idx: WireIdx) -> &[FetIdx] {
        let i = usize::from(idx);
        let start = self.gate_offsets[i] as usize;
        let end = self.gate_offsets[i + 1] as usize;
        &self.gate_ids[start..end]
    }

    pub(crate) fn pulled(&self, idx: WireIdx) -> WireState {
        self.wire_pulled[usize::from(idx)]
    }

    pub(crate) fn set_pulled(&mut self, idx: WireIdx, pulled: WireState) {
        self.wire_pulled[usize::from(idx)] = pulled;
    }

    pub(crate) fn state(&self, idx: WireIdx) -> WireState {
        self.wire_state[usize::from(idx)]
    }

    pub(crate) fn set_state(&mut self, idx: WireIdx, state: WireState) {
        self.wire_state[usize::from(idx)] = state;
    }

    pub(crate) fn fet_other_side(&self, fet: FetIdx, from: WireIdx) -> WireIdx {
        let i = usize::from(fet);
        let mut other = self.fet_side1[i];
        if self.fet_side1[i] == from {
            other = self.fet_side2[i];
        }
        if self.fet_side2[i] == from {
            other = self.fet_side1[i];
        }
        other
    }

    pub(crate) fn fet_gate_is_high(&self, fet: FetIdx) -> bool {
        self.fet_gate_high.contains(usize::from(fet))
    }

    pub(crate) fn fet_side1(&self, fet: FetIdx) -> WireIdx {
        self.fet_side1[usize::from(fet)]
    }

    pub(crate) fn fet_side2(&self, fet: FetIdx) -> WireIdx {
        self.fet_side2[usize::from(fet)]
    }

    pub(crate) fn set_fet_gate_high(&mut self, fet: FetIdx, high: bool) {
        self.fet_gate_high.set(usize::from(fet), high);
    }
}

/// Per-wire record accumulated while the netlist is being assembled.
#[derive(Debug)]
struct RawWire {
    name: String,
    pulled: WireState,
    control: Vec<FetIdx>,
    gate: Vec<FetIdx>,
    is_null: bool,
}

/// Per-transistor record accumulated while the netlist is being assembled.
#[derive(Debug)]
struct RawFet {
    gate: WireIdx,
    side1: WireIdx,
    side2: WireIdx,
    is_null: bool,
}

/// Incrementally assembles a [`Netlist`], validating the structural
/// invariants from the loading contract as it goes, then compacts the
/// per-wire adjacency lists into flat CSR arrays on [`NetlistBuilder::build`].
///
/// This is the seam a [`crate::loader`] implementation (or any other source
/// of a parsed circuit) drives; it's also handy directly in tests that want
/// to hand-build a small netlist without going through a byte format.
#[derive(Debug, Default)]
pub struct NetlistBuilder {
    wires: Vec<RawWire>,
    fets: Vec<RawFet>,
}

impl NetlistBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a (possibly unnamed) wire with the given pull, returning its index.
    pub fn add_wire(&mut self, name: impl Into<String>, pulled: WireState) -> WireIdx {
        let idx = WireIdx::from(self.wires.len());
        self.wires.push(RawWire {
            name: name.into(),
            pulled,
            control: Vec::new(),
            gate: Vec::new(),
            is_null: false,
        });
        idx
    }

    /// Adds a null wire slot (an input that never appears in the netlist).
    pub fn add_null_wire(&mut self) -> WireIdx {
        let idx = WireIdx::from(self.wires.len());
        self.wires.push(RawWire {
            name: String::new(),
            pulled: WireState::from_bits(0),
            control: Vec::new(),
            gate: Vec::new(),
            is_null: true,
        });
        idx
    }

    /// Adds a transistor, wiring up the control/gate adjacency of its three
    /// wires, returning its index.
    ///
    /// # Panics
    /// Panics if `gate`, `side1`, or `side2` is out of bounds for wires
    /// already added — the loader is expected to add all wires before any
    /// transistor.
    pub fn add_fet(&mut self, gate: WireIdx, side1: WireIdx, side2: WireIdx) -> FetIdx {
        let idx = FetIdx::from(self.fets.len());
        self.wires[usize::from(gate)].gate.push(idx);
        self.wires[usize::from(side1)].control.push(idx);
        self.wires[usize::from(side2)].control.push(idx);
        self.fets.push(RawFet {
            gate,
            side1,
            side2,
            is_null: false,
        });
        idx
    }

    /// Adds a null transistor slot.
    pub fn add_null_fet(&mut self) -> FetIdx {
        let idx = FetIdx::from(self.fets.len());
        self.fets.push(RawFet {
            gate: WireIdx::NULL,
            side1: WireIdx::NULL,
            side2: WireIdx::NULL,
            is_null: true,
        });
        idx
    }

    /// Validates the accumulated netlist and compacts it into a [`Netlist`].
    ///
    /// Fails with [`SimError::MalformedNetlist`] if `"VCC"` or `"VSS"` is
    /// missing, or if a null transistor has a non-null side/gate (or vice
    /// versa).
    pub fn build(self) -> Result<Netlist, SimError> {
        let num_wires = self.wires.len();
        let num_fets = self.fets.len();

        let vcc = self
            .wires
            .iter()
            .position(|w| !w.is_null && w.name == "VCC")
            .map(WireIdx::from)
            .ok_or_else(|| SimError::malformed("no wire named \"VCC\""))?;
        let gnd = self
            .wires
            .iter()
            .position(|w| !w.is_null && w.name == "VSS")
            .map(WireIdx::from)
            .ok_or_else(|| SimError::malformed("no wire named \"VSS\""))?;

        for (i, f) in self.fets.iter().enumerate() {
            let sides_null = f.side1.is_null() || f.side2.is_null() || f.gate.is_null();
            if f.is_null != sides_null {
                return Err(SimError::malformed(format!(
                    "transistor #{i} null-ness disagrees between its flag and its wire indices"
                )));
            }
        }

        let mut wire_null = FixedBitSet::with_capacity(num_wires);
        let mut wire_name = Vec::with_capacity(num_wires);
        let mut wire_pulled = Vec::with_capacity(num_wires);
        let mut wire_state = Vec::with_capacity(num_wires);
        let mut control_offsets = Vec::with_capacity(num_wires + 1);
        let mut control_ids = Vec::new();
        let mut gate_offsets = Vec::with_capacity(num_wires + 1);
        let mut gate_ids = Vec::new();
        let mut name_to_idx = HashMap::new();

        control_offsets.push(0u32);
        gate_offsets.push(0u32);
        for (i, w) in self.wires.into_iter().enumerate() {
            wire_null.set(i, w.is_null);
            wire_pulled.push(w.pulled);
            wire_state.push(if w.is_null {
                WireState::from_bits(0)
            } else {
                WireState::FLOATING
            });
            control_ids.extend_from_slice(&w.control);
            control_offsets.push(control_ids.len() as u32);
            gate_ids.extend_from_slice(&w.gate);
            gate_offsets.push(gate_ids.len() as u32);
            if !w.is_null && !w.name.is_empty() {
                name_to_idx.insert(w.name.clone(), WireIdx::from(i));
            }
            wire_name.push(w.name);
        }

        let mut fet_null = FixedBitSet::with_capacity(num_fets);
        let mut fet_side1 = Vec::with_capacity(num_fets);
        let mut fet_side2 = Vec::with_capacity(num_fets);
        let mut fet_gate = Vec::with_capacity(num_fets);
        let mut fet_gate_high = FixedBitSet::with_capacity(num_fets);
        for (i, f) in self.fets.into_iter().enumerate() {
            fet_null.set(i, f.is_null);
            fet_side1.push(f.side1);
            fet_side2.push(f.side2);
            fet_gate.push(f.gate);
            if !f.is_null && f.gate == vcc {
                fet_gate_high.insert(i);
            }
        }

        let mut netlist = Netlist {
            vcc,
            gnd,
            wire_null,
            wire_name,
            wire_pulled,
            wire_state,
            control_offsets,
            control_ids,
            gate_offsets,
            gate_ids,
            fet_null,
            fet_side1,
            fet_side2,
            fet_gate,
            fet_gate_high,
            name_to_idx,
        };

        netlist.wire_state[usize::from(vcc)] = WireState::HIGH;
        netlist.wire_state[usize::from(gnd)] = WireState::GROUNDED;

        Ok(netlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_vcc_and_vss() {
        let mut b = NetlistBuilder::new();
        b.add_wire("VCC", WireState::from_bits(0));
        let err = b.build().unwrap_err();
        assert!(matches!(err, SimError::MalformedNetlist { .. }));
    }

    #[test]
    fn rails_get_their_permanent_state() {
        let mut b = NetlistBuilder::new();
        let vcc = b.add_wire("VCC", WireState::from_bits(0));
        let vss = b.add_wire("VSS", WireState::from_bits(0));
        let nl = b.build().unwrap();
        assert_eq!(nl.state(vcc), WireState::HIGH);
        assert_eq!(nl.state(vss), WireState::GROUNDED);
        assert_eq!(nl.vcc(), vcc);
        assert_eq!(nl.gnd(), vss);
    }

    #[test]
    fn fets_gated_by_vcc_start_conducting() {
        let mut b = NetlistBuilder::new();
        let vcc = b.add_wire("VCC", WireState::from_bits(0));
        let vss = b.add_wire("VSS", WireState::from_bits(0));
        let a = b.add_wire("a", WireState::from_bits(0));
        let fet = b.add_fet(vcc, a, vss);
        let nl = b.build().unwrap();
        assert!(nl.fet_gate_is_high(fet));
    }

    #[test]
    fn name_lookup_finds_added_wires() {
        let mut b = NetlistBuilder::new();
        b.add_wire("VCC", WireState::from_bits(0));
        b.add_wire("VSS", WireState::from_bits(0));
        b.add_wire("clk0", WireState::from_bits(0));
        let nl = b.build().unwrap();
        assert!(nl.wire_index_by_name("clk0").is_some());
        assert!(nl.wire_index_by_name("nope").is_none());
    }
}
