pub mod config;
pub mod contract;
pub mod eip1193;

pub use config::{RuntimeProfile, WalletConfig};
pub use contract::{ContractAdapter, ContractHandle};
pub use eip1193::Eip1193Adapter;
