//! Authentication and authorization for Agora
//!
//! Provides:
//! - JWT token generation and validation
//! - Token resolution from bearer header or cookie
//! - Permission levels for forum actions
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;
pub mod permissions;

pub use jwt::{
    extract_token_from_cookie, extract_token_from_header, Claims, JwtValidator, TokenInput,
    TokenValidationResult, TOKEN_COOKIE,
};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use permissions::{is_action_allowed, required_permission, ForumAction, PermissionLevel};
