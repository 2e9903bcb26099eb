//! Lua scripts for atomic ticket operations.

/// Lua script that issues a ticket.
///
/// Arguments:
/// - KEYS[1]: Counter key (e.g., `tickets:counter`)
/// - KEYS[2]: Store key (e.g., `tickets:store`)
///
/// Returns:
/// - The new ticket value (integer). The value is appended to the store in
///   the same atomic step, so a ticket can never be handed out without being
///   redeemable.
pub const ISSUE_TICKET: &str = r"
local ticket = redis.call('INCR', KEYS[1])
redis.call('RPUSH', KEYS[2], ticket)
return ticket
";
