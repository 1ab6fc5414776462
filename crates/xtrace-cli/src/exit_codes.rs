//! Process exit codes of the `xtrace` binary.

pub const SUCCESS: i32 = 0;
pub const SEND_FAILED: i32 = 1; // Probe segment could not be handed to the socket
pub const CONFIG_ERROR: i32 = 2;
