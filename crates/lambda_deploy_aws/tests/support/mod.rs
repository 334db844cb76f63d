pub mod fakes;
pub mod session;
