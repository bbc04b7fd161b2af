// Core modules for input validation, request path resolution, and error modeling.
pub mod config;
pub mod error;
pub mod resolve;
