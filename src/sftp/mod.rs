//! Loopback SSH server with an SFTP subsystem, used by the transfer tests.

pub mod handler;
pub mod session;

pub use server::{LoopbackServer, UnameReply};
