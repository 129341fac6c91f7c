pub mod audit;
pub mod cleanup;
pub mod collision;
pub mod config;
pub mod extract;
pub mod identity;
pub mod index;
pub mod lock;
pub mod manifest;
pub mod paths;
pub mod pipeline;
pub mod reconcile;
pub mod upload;
pub mod warn;
