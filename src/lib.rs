pub mod export;
pub mod mapper;
pub mod output;
pub mod parser;
