pub mod config;
pub mod io_struct;
pub mod logging;
pub mod middleware;
pub mod normalizer;
pub mod server;
pub mod upstream;

pub use config::RelayConfig;
pub use normalizer::{normalize, Normalized};
pub use server::startup;
pub use upstream::{UpstreamClient, UpstreamError};
