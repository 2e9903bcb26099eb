//! HTTP request handlers for the relay.

pub mod status;
pub mod tickets;

pub use status::get_status;
pub use tickets::get_ticket;
