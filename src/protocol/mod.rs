//! Wire protocol for the read-aloud service: pseudo-HTTP frame parsing and
//! the per-segment session state machine.

pub(crate) mod frame;
pub(crate) mod session;
