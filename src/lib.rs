pub mod accounting;
pub mod bucket;
pub mod chain_reads;
pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod deployment;
pub mod error;
pub mod events;
pub mod keys;
pub mod repository;
pub mod rpc;
pub mod scanner;
