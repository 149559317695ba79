//! HTTP request handlers.

pub mod health;
pub mod jobs;
pub mod pull;
pub mod push;
pub mod templates;

pub use health::*;
pub use jobs::*;
pub use pull::*;
pub use push::*;
pub use templates::*;
