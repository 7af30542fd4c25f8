pub mod model;
pub mod note_name;

pub use model::*;
pub use note_name::*;
