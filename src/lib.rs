pub mod account;
pub mod bundler;
pub mod config;
pub mod consts;
pub mod deployer;
pub mod errors;
pub mod factory;
pub mod funding;
pub mod gen;
pub mod network;
pub mod session;
pub mod submitter;
pub mod traits;
pub mod types;
mod userop_middleware;
pub mod utils;

pub use userop_middleware::UserOpMiddleware;
