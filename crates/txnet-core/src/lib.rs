pub mod address;
pub mod error;
pub mod network;
pub mod resolver;
pub mod source;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_util;

pub use error::{ChainServiceError, CoreError};
pub use resolver::TransactionResolver;
pub use types::{Blockchain, NetworkGraph, NetworkRequest, TimeWindow, TransactionRecord};
