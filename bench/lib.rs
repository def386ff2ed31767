#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod gain;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod table;
