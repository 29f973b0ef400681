//! Connection plumbing: socket transport, Telnet filtering, line
//! reassembly, and the session driver that ties them together.
//!
//! # Data path
//!
//! ```text
//! Session
//! ├── Connection (TCP with a short read timeout)
//! ├── TelnetFilter (strip commands, refuse all negotiation)
//! ├── RxAccumulator (normalized bytes → complete lines)
//! └── TextBuffer (transcript store + wrapped view)
//! ```

pub mod line;
pub mod net;
pub mod session;
pub mod telnet;
