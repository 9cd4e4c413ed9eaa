pub mod batch;
pub mod extract;
pub mod fetcher;
pub mod naming;
pub mod parser;
pub mod progress;
pub mod resolver;
pub mod scanner;
pub mod tagger;
