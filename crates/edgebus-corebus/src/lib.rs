//! Core-bus: the intra-process RPC transport every daemon in the agent
//! speaks over local AF_UNIX stream sockets (spec §4.C). A server
//! registers named methods; a client `call`s, `notify`s, or `subscribe`s.

pub mod client;
pub mod handle_pool;
pub mod protocol;
pub mod server;
pub mod wire;

pub use client::{Client, Subscription};
pub use handle_pool::{Handle, HandlePool};
pub use server::{MethodDesc, ResponseHandle, Server};

/// Ignores `SIGPIPE` once at process start, so a write to a peer that has
/// already closed its read side surfaces as an `EPIPE` `Result::Err`
/// instead of terminating the process (every core-bus binary calls this
/// during startup, mirroring the original nucleus's signal setup).
pub fn ignore_sigpipe() {
    // SAFETY: installing a signal disposition via libc::signal at startup,
    // before any other thread exists, is the same precondition the
    // original C nucleus relies on.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_sigpipe_does_not_panic() {
        ignore_sigpipe();
    }
}
