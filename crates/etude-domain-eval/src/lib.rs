pub mod feedback;
pub mod scorer;

pub use feedback::*;
pub use scorer::*;
