//! `caretrack-auth`: authentication and authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: it knows about roles,
//! permissions, tokens, password hashes and the user record, nothing else.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{
    AuthorizationExplanation, AuthzError, Principal, RbacRegistry, TenantMembership, authorize,
    explain_authorization,
};
pub use claims::{
    Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, issue_token, validate_claims,
};
pub use password::{PasswordError, hash_password, verify_password, verify_unknown_account};
pub use permissions::{Permission, default_role_permissions};
pub use roles::Role;
pub use user::{User, normalize_email};
