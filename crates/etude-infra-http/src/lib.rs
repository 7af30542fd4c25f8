mod assistant;
mod client;
mod data;

pub use assistant::HttpAssistantService;
pub use client::{ServiceClient, DEFAULT_TIMEOUT};
pub use data::HttpDataService;
