pub mod coordinator;
pub mod processor;
pub mod request;
