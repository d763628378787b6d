pub mod annotations;
pub mod book;
pub mod classify;
pub mod engine;
pub mod error;
pub mod export;
pub mod extract;
pub mod filter;
pub mod game;
pub mod reader;
pub mod sampler;
pub mod stats;
pub mod survey;
pub mod types;
pub mod visitor;
