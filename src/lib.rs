pub mod config;
pub mod error;
pub mod fetch;
pub mod join;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod present;
pub mod records;
pub mod selection;
pub mod stats;
