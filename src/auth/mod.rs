//! Authentication module

pub mod clock;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use clock::{Clock, ManualClock, SystemClock};
pub use jwt::{Claims, JwtService, TokenError, TokenKind, TokenPair};
pub use middleware::{auth_gate_middleware, extract_bearer, AuthContext, PathAllowList};
pub use password::PasswordHasher;
