mod events;
mod runner;
mod session;
mod state;

pub use events::SessionEvent;
pub use runner::ScenarioEngine;
pub use session::{CLARIFY_MESSAGE, COMPLETION_MESSAGE, ChatSession};
pub use state::EngineState;
