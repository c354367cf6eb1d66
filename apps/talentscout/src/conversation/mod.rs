// Candidate conversation: stages, intent checks, the state machine driving a
// session and the HTTP handlers hosting sessions.

pub mod handlers;
pub mod intent;
pub mod machine;
pub mod messages;
pub mod session;
pub mod stage;
pub mod store;
