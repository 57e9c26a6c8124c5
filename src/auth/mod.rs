mod helpers;
mod middleware;
mod token;

pub use helpers::issue_session;
pub use middleware::{RequireAdmin, RequireUser};
pub use token::{TokenGenerator, generate_password, hash_password, parse_token, verify_password};
