pub mod backend;
pub mod gateway;
pub mod http;
pub mod presence;
pub mod profile;
pub mod session;
pub mod typing;
pub mod unread;

pub use backend::{ChatBackend, ClientError, ClientResult};
pub use http::HttpBackend;
pub use session::{ChatSession, Panel, TypingBroadcast};
pub use typing::TypingSignal;
