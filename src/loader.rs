//! Minimal concrete [`CircuitLoader`]: decodes the little-endian binary
//! container described in the loading contract into a [`Netlist`].
//!
//! The persisted circuit file format is a collaborator out of this crate's
//! scope; this reader exists so the solver is independently testable from
//! bytes instead of requiring every test to hand-build a [`NetlistBuilder`].
//! It favors a straightforward reading of the field layout over a
//! streaming/SIMD decode path.

use std::io::Read;

use crate::error::SimError;
use crate::netlist::{Netlist, NetlistBuilder};
use crate::wire_state::WireState;
use crate::WireIdx;

/// 4-byte magic at the start of every netlist file: `b"NMOS"`.
pub const MAGIC: [u8; 4] = *b"NMOS";

/// The only format version this loader understands.
pub const FORMAT_VERSION: u8 = 1;

/// End-of-segment sentinel terminating a wire's `WIRE_CTRL_FETS`/`WIRE_GATES` list.
const NEXT_CTRL: u16 = 0xFFFE;

/// Null-transistor sentinel used in the `side1`/`side2`/`gate` arrays.
const NO_WIRE: u16 = 0xFFFD;

/// `pulled`/`gate` byte values in the on-disk format.
const PULLED_NONE: u8 = 0;
const PULLED_HIGH: u8 = 1;
const PULLED_LOW: u8 = 2;

/// Reads a netlist from the little-endian binary container produced by the
/// out-of-scope circuit-file writer.
///
/// Layout: 4-byte magic, 1-byte version, `num_wires: u32`, `num_fets: u32`,
/// then for each wire a length-prefixed UTF-8 name, a `pulled` byte, and the
/// `WIRE_CTRL_FETS`/`WIRE_GATES` segments (`u16` ids terminated by
/// [`NEXT_CTRL`]); then three `num_fets`-length `u16` arrays for
/// `side1`/`side2`/`gate`, using [`NO_WIRE`] for null transistors.
///
/// The netlist graph itself is built from the `side1`/`side2`/`gate` arrays
/// (via [`NetlistBuilder::add_fet`]); each wire's own `WIRE_CTRL_FETS`/
/// `WIRE_GATES` segment is then cross-checked against that graph rather than
/// folded into it, so a file where the two disagree is rejected instead of
/// silently trusting whichever one the graph happened to be built from.
pub fn read_netlist<R: Read>(mut r: R) -> Result<Netlist, SimError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(SimError::malformed(format!(
            "bad magic: expected {:?}, got {:?}",
            MAGIC, magic
        )));
    }

    let version = read_u8(&mut r)?;
    if version != FORMAT_VERSION {
        return Err(SimError::malformed(format!(
            "unsupported format version {version}"
        )));
    }

    let num_wires = read_u32(&mut r)? as usize;
    let num_fets = read_u32(&mut r)? as usize;

    let mut builder = NetlistBuilder::new();
    let mut claimed_ctrl: Vec<Vec<u16>> = Vec::with_capacity(num_wires);
    let mut claimed_gate: Vec<Vec<u16>> = Vec::with_capacity(num_wires);

    for i in 0..num_wires {
        let name = read_string(&mut r)?;
        let pulled_byte = read_u8(&mut r)?;
        let pulled = match pulled_byte {
            PULLED_NONE => WireState::from_bits(0),
            PULLED_HIGH => WireState::PULLED_HIGH,
            PULLED_LOW => WireState::PULLED_LOW,
            other => {
                return Err(SimError::malformed(format!(
                    "wire #{i}: invalid pulled byte {other}"
                )));
            }
        };
        let ctrl = read_segment(&mut r, i, "WIRE_CTRL_FETS")?;
        let gate = read_segment(&mut r, i, "WIRE_GATES")?;

        if name.is_empty() && ctrl.is_empty() && gate.is_empty() {
            builder.add_null_wire();
        } else {
            let idx = builder.add_wire(name, pulled);
            debug_assert_eq!(usize::from(idx), i);
        }
        claimed_ctrl.push(ctrl);
        claimed_gate.push(gate);
    }

    let side1 = read_u16_array(&mut r, num_fets)?;
    let side2 = read_u16_array(&mut r, num_fets)?;
    let gate = read_u16_array(&mut r, num_fets)?;

    for i in 0..num_fets {
        let s1 = side1[i];
        let s2 = side2[i];
        let g = gate[i];
        let any_null = s1 == NO_WIRE || s2 == NO_WIRE || g == NO_WIRE;
        let all_null = s1 == NO_WIRE && s2 == NO_WIRE && g == NO_WIRE;
        if any_null && !all_null {
            return Err(SimError::malformed(format!(
                "transistor #{i}: side1={s1}, side2={s2}, gate={g} \
                 disagree on null-ness"
            )));
        }
        if all_null {
            builder.add_null_fet();
        } else {
            let fet_id = i as u16;
            require_segment_contains(&claimed_ctrl, s1, fet_id, i, "side1", "WIRE_CTRL_FETS")?;
            require_segment_contains(&claimed_ctrl, s2, fet_id, i, "side2", "WIRE_CTRL_FETS")?;
            require_segment_contains(&claimed_gate, g, fet_id, i, "gate", "WIRE_GATES")?;
            builder.add_fet(
                WireIdx::from(u32::from(g)),
                WireIdx::from(u32::from(s1)),
                WireIdx::from(u32::from(s2)),
            );
        }
    }

    builder.build()
}

/// Checks that wire `wire_id`'s parsed `field` segment lists `fet_id`, per
/// the loading contract's "a transistor's side wire does not list the
/// transistor in its control set" failure case. `role` names which of the
/// transistor's three wires is being checked, for the error message.
fn require_segment_contains(
    segments: &[Vec<u16>],
    wire_id: u16,
    fet_id: u16,
    fet_idx: usize,
    role: &str,
    field: &str,
) -> Result<(), SimError> {
    let segment = &segments[wire_id as usize];
    if !segment.contains(&fet_id) {
        return Err(SimError::malformed(format!(
            "transistor #{fet_idx}: {role} wire #{wire_id} does not list it in its {field} segment"
        )));
    }
    Ok(())
}

fn read_segment<R: Read>(r: &mut R, wire_idx: usize, field: &str) -> Result<Vec<u16>, SimError> {
    let count = read_u16(r)? as usize;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(read_u16(r)?);
    }
    let terminator = read_u16(r)?;
    if terminator != NEXT_CTRL {
        return Err(SimError::malformed(format!(
            "wire #{wire_idx}: {field} segment missing NEXT_CTRL sentinel \
             (found {terminator:#06x} after {count} id(s))"
        )));
    }
    Ok(ids)
}

fn read_u16_array<R: Read>(r: &mut R, len: usize) -> Result<Vec<u16>, SimError> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_u16(r)?);
    }
    Ok(out)
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8, SimError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(r: &mut R) -> Result<u16, SimError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, SimError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_string<R: Read>(r: &mut R) -> Result<String, SimError> {
    let len = read_u16(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| SimError::malformed(format!("non-UTF-8 wire name: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-encodes the inverter from scenario S1 and checks it round-trips
    /// through the loader into a netlist with the expected topology.
    #[test]
    fn decodes_a_minimal_inverter_netlist() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&4u32.to_le_bytes()); // num_wires: VCC, VSS, A, OUT
        bytes.extend_from_slice(&1u32.to_le_bytes()); // num_fets

        // fet 0: gate=A, side1=OUT, side2=VSS — so VSS/OUT carry it in their
        // control-transistor segment and A carries it in its gate segment.
        write_wire(&mut bytes, "VCC", PULLED_NONE, &[], &[]);
        write_wire(&mut bytes, "VSS", PULLED_NONE, &[0], &[]);
        write_wire(&mut bytes, "A", PULLED_LOW, &[], &[0]);
        write_wire(&mut bytes, "OUT", PULLED_HIGH, &[0], &[]);

        // side1/side2/gate arrays: fet 0 = gate A(2), side1 OUT(3), side2 VSS(1)
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());

        let netlist = read_netlist(&bytes[..]).unwrap();
        assert_eq!(netlist.num_wires(), 4);
        assert_eq!(netlist.num_fets(), 1);
        assert!(netlist.wire_index_by_name("VCC").is_some());
        assert!(netlist.wire_index_by_name("VSS").is_some());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8; 16];
        let err = read_netlist(&bytes[..]).unwrap_err();
        assert!(matches!(err, SimError::MalformedNetlist { .. }));
    }

    #[test]
    fn rejects_missing_next_ctrl_sentinel() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        // name "VCC"
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(b"VCC");
        bytes.push(PULLED_NONE);
        bytes.extend_from_slice(&0u16.to_le_bytes()); // ctrl count 0
        bytes.extend_from_slice(&0x1234u16.to_le_bytes()); // wrong terminator

        let err = read_netlist(&bytes[..]).unwrap_err();
        assert!(matches!(err, SimError::MalformedNetlist { .. }));
    }

    /// The same inverter as `decodes_a_minimal_inverter_netlist`, except
    /// `VSS`'s `WIRE_CTRL_FETS` segment omits the transistor that
    /// `FET_SIDE2_WIRE_INDS` assigns to it — the loader must catch this
    /// rather than silently trusting the FET arrays.
    #[test]
    fn rejects_control_segment_that_omits_its_transistor() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());

        write_wire(&mut bytes, "VCC", PULLED_NONE, &[], &[]);
        // VSS's WIRE_CTRL_FETS segment should list fet 0 (its side2 below)
        // but doesn't.
        write_wire(&mut bytes, "VSS", PULLED_NONE, &[], &[]);
        write_wire(&mut bytes, "A", PULLED_LOW, &[], &[0]);
        write_wire(&mut bytes, "OUT", PULLED_HIGH, &[0], &[]);

        bytes.extend_from_slice(&3u16.to_le_bytes()); // side1 = OUT
        bytes.extend_from_slice(&1u16.to_le_bytes()); // side2 = VSS
        bytes.extend_from_slice(&2u16.to_le_bytes()); // gate = A

        let err = read_netlist(&bytes[..]).unwrap_err();
        assert!(matches!(err, SimError::MalformedNetlist { .. }));
    }

    fn write_wire(bytes: &mut Vec<u8>, name: &str, pulled: u8, ctrl: &[u16], gate: &[u16]) {
        bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(pulled);
        write_segment(bytes, ctrl);
        write_segment(bytes, gate);
    }

    fn write_segment(bytes: &mut Vec<u8>, ids: &[u16]) {
        bytes.extend_from_slice(&(ids.len() as u16).to_le_bytes());
        for id in ids {
            bytes.extend_from_slice(&id.to_le_bytes());
        }
        bytes.extend_from_slice(&NEXT_CTRL.to_le_bytes());
    }
}
