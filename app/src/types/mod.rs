//! Shared value types: addresses, coins, and the request/response shapes
//! exchanged with the consensus collaborator.

pub mod abci;
pub mod address;
pub mod coin;

pub use abci::{
    CommitInfo, GenesisValidator, Header, RequestInitChain, ResponseDeliverTx, ResponseInitChain,
};
pub use address::Address;
pub use coin::{Coin, Coins};
