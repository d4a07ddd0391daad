//! Intake Agent: a conversational interview that ends in a delivered document.

pub mod channels;
pub mod config;
pub mod delivery;
pub mod error;
pub mod interview;
pub mod llm;
pub mod store;
