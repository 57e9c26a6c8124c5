mod account;
mod admin;
pub mod dto;
pub mod response;
mod router;
mod social;
mod user;
pub mod validation;

pub use router::{AppState, create_router};
