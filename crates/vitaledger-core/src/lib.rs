pub mod audit;
pub mod constants;
pub mod error;
pub mod mempool;
pub mod priority;
pub mod reference;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use error::VitaLedgerError;
