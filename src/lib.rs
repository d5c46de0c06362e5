pub mod arguments;
pub mod backend;
pub mod config;
pub mod errors;
pub mod feed;
pub mod ledger;
pub mod logger;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
