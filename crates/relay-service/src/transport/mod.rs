//! Transport boundary: turns WebSocket sockets into hub lifecycle events.

pub mod websocket;

pub use websocket::{serve_connection, ws_handler, TransportSettings};
