pub mod app;
pub mod bus;
pub mod continuity;
pub mod dedup;
pub mod diagnostics;
pub mod engine;
pub mod ipc;
pub mod normalize;
pub mod note_state;
pub mod recorder;

pub use app::*;
pub use bus::*;
pub use continuity::*;
pub use dedup::*;
pub use diagnostics::*;
pub use engine::*;
pub use ipc::*;
pub use normalize::*;
pub use note_state::*;
pub use recorder::*;
