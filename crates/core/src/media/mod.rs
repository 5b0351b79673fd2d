//! Media identification and metadata lookup.

mod cinemeta;
mod types;

pub use cinemeta::CinemetaClient;
pub use types::*;
