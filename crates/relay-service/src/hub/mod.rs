//! The relay core: connection registry, admission gate, and fan-out.
//!
//! # Ownership
//!
//! ```text
//! BroadcastHub (one per process, Arc-shared)
//! ├── ConnectionRegistry   (Mutex<HashMap<ConnectionId, ConnectionHandle>>)
//! └── Arc<dyn TicketService>
//!
//! connection task (one per socket)
//! └── ConnectionSession
//!     ├── ConnectionHandle (clone also held by the registry)
//!     └── AdmissionGate    (owned, never shared)
//! ```
//!
//! The registry is the only cross-task state. Admission state lives in the
//! session and is only touched by the task that owns it.

pub mod broadcast;
pub mod connection;
pub mod gate;
pub mod registry;

pub use broadcast::{BroadcastHub, ConnectionSession, FanOutReport, MessageDisposition};
pub use connection::{CloseReason, ConnectionHandle, Outbound};
pub use gate::{AdmissionGate, AdmissionState, GateOutcome, RejectReason};
pub use registry::ConnectionRegistry;
