pub mod cleaner;
pub mod config;
pub mod constants;
pub mod dates;
pub mod elastic;
pub mod enrich;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod purge;
pub mod storage;
pub mod table;
pub mod transformer;
pub mod types;
