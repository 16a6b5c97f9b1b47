pub mod backend;
pub mod classify;
pub mod cli;
pub mod config;
pub mod deps;
pub mod error;
pub mod model;
pub mod page;
pub mod relations;
pub mod resolver;
pub mod rpc;
pub mod semantic;
pub mod util;
