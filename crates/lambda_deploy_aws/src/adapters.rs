pub mod engine;
pub mod function;
pub mod gateway;
pub mod http;
pub mod identity;
pub mod logs;
pub mod registry;
pub mod tools;
