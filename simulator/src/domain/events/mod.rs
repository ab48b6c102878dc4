pub mod conversation;

pub use conversation::{ConversationLog, ConversationTurn, Speaker};
