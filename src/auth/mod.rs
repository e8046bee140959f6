mod middleware;
mod token;

pub use middleware::{AuthError, CUSTOMER_TOKEN_HEADER, RequireTenant, resolve_tenant};
pub use token::{generate_token, token_digest};
