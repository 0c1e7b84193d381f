//! NMOS switch-network solver — gate-level netlist simulation core.
//!
//! Models a netlist as wires joined by NMOS transistors and computes the
//! settled logical value of every wire after an external stimulus (a clock
//! edge, a changed input pad). See [`facade::SimulatorFacade`] for the public
//! entry point.

mod calculator;
mod coords;
mod error;
mod facade;
mod loader;
mod netlist;
mod wire_state;

pub use calculator::{Counters, SolverConfig, WireCalculator};
pub use coords::{FetIdx, WireIdx};
pub use error::SimError;
pub use facade::SimulatorFacade;
pub use loader::read_netlist;
pub use netlist::{Fet, Netlist, NetlistBuilder, Wire};
pub use wire_state::WireState;
