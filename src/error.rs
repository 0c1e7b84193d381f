//! Error types surfaced to callers of this crate.

/// Errors raised while loading a netlist or solving it.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The netlist failed a structural check while loading.
    #[error("malformed netlist: {reason}")]
    MalformedNetlist {
        /// What invariant was violated.
        reason: String,
    },

    /// A `*_wn` (wire-by-name) operation was given a name not present in the netlist.
    #[error("unknown wire: {name:?}")]
    UnknownWire {
        /// The name that was looked up.
        name: String,
    },

    /// The iteration driver hit its step limit without reaching a fixed point.
    ///
    /// Only raised when `half_clock_count > 0`; see the solver's convergence
    /// policy for why the very first settle tolerates this instead.
    #[error(
        "did not converge after {half_clock_count} half-clocks: \
         {pending} wire(s) still pending at the step limit"
    )]
    DidNotConverge {
        /// The `half_clock_count` passed to the `recalc_*` call that failed.
        half_clock_count: u32,
        /// How many wires were still queued when the step limit was hit.
        pending: usize,
    },

    /// The loader's underlying byte stream failed.
    #[error("netlist I/O error")]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn malformed(reason: impl Into<String>) -> SimError {
        SimError::MalformedNetlist {
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_wire(name: impl Into<String>) -> SimError {
        SimError::UnknownWire { name: name.into() }
    }
}

