pub mod remote;
pub mod run;
pub mod session;
pub mod tools;
