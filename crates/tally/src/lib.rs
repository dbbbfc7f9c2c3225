pub mod agent;
pub mod api;
pub mod conversation;
pub mod errors;
pub mod invoker;
pub mod math;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod registry;
pub mod remote;
