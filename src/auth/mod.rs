//! Authentication and authorization module

pub mod cookie;
pub mod csrf;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod rate_limit;

pub use cookie::{set_session_cookies, unset_session_cookies};
pub use csrf::csrf_middleware;
pub use jwt::{Claims, JwtService};
pub use middleware::{
    admin_middleware, auth_middleware, extract_token, optional_auth_middleware, resolve_principal,
};
pub use password::PasswordHasher;
pub use policy::can_modify;
pub use rate_limit::{EndpointClass, RateLimiter};
