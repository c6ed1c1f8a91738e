pub mod api;
pub mod events;
pub mod models;

/// Minimum display-name length after trimming.
pub const MIN_USERNAME_LENGTH: usize = 2;

/// Maximum message length in characters. About 150-200 words.
pub const MAX_MESSAGE_LENGTH: usize = 1000;
