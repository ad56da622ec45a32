pub mod handlers;
pub mod middleware;
mod routes;

pub use routes::create_router;
