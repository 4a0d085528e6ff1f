pub mod config;
pub mod db;
pub mod error;
pub mod instrument;
pub mod ledger;
pub mod matching;
pub mod models;
pub mod order_store;
pub mod trade_store;

pub use config::EngineConfig;
pub use error::EngineError;
pub use instrument::{InstrumentGate, PgInstrumentGate, CASH};
pub use ledger::Ledger;
pub use matching::{BookSnapshot, Level, MatchingEngine};
