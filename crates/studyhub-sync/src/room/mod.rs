//! Room membership, typing indicators, and liveness heartbeats.

pub mod heartbeat;
pub mod membership;
