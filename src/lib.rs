pub mod agents;
pub mod clarify;
pub mod cli;
pub mod config;
pub mod doctor;
pub mod error;
pub mod executor;
pub mod mcp;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod planner;
pub mod prompt_engineer;
pub mod runner;
pub mod splitter;
pub mod workspace;

#[cfg(test)]
mod tests;
