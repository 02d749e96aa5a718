//! Story sessions: the consumer-facing cache API and its builder.

mod builder;
mod story;

pub use builder::{Huginn, HuginnBuilder};
pub use story::StorySession;
