//! I/O backend implementations. The capability trait itself
//! (`IoBackend`) lives in `io_bridge`, where the bridge that drives it
//! is defined; this module holds concrete implementations.

pub mod simulator;
