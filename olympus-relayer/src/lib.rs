#![allow(dead_code)]

pub mod addrs;
pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod keys;
pub mod logging;
pub mod node;
