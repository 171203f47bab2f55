//! Identity for the portal: who is calling and what they may do.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod token;
mod provider;
mod authorizer;

pub use principal::Principal;
pub use token::{bearer_token, Claims, TokenSigner};
pub use provider::{AdminOutcome, AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse, SignupRequest};
pub use authorizer::{authorize, check_operation_allowed, ItemOperation, RequiredRole};
