//! Public types for the Huginn API.

mod continuation;
mod request;
mod style;

pub use continuation::{Continuation, Usage};
pub use request::GenerationRequest;
pub use style::StyleParams;
