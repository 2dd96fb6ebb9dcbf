pub mod ast;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod object;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod sink;
pub mod token;
pub mod value;
