pub mod adapters;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod web;
