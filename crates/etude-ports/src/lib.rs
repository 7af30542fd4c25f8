pub mod midi;
pub mod services;
pub mod storage;
pub mod types;

pub use midi::*;
pub use services::*;
pub use storage::*;
pub use types::*;
