pub mod handlers;
pub mod lfs_sync;
pub mod middleware;
pub mod mirrors;
pub mod routes;

pub use routes::create_router;
