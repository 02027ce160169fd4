//! Application modules. Each module owns its store key, its keeper, its
//! messages, and the handler registered for its route.

pub mod auth;
pub mod bank;
pub mod cool;
pub mod ibc;
pub mod params;
pub mod pow;
pub mod staking;
