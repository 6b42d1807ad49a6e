//! Library crate for streak-squad-back, exposing modules for the binary and
//! integration tests.

pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod oracle;
pub mod routes;
pub mod services;
pub mod state;
