pub mod debrids;
pub mod handlers;
pub mod indexers;
pub mod middleware;
pub mod routes;
pub mod stremio;

pub use routes::create_router;
