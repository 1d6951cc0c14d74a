pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod db;
pub mod error;
pub mod gallery;
pub mod lock;
pub mod logging;
pub mod remote;
pub mod scanner;
pub mod transfer;
