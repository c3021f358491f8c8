pub mod clock;
pub mod codec;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod policy;
pub mod principal;
pub mod token_service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Token, TokenCodec};
pub use credentials::{CredentialVerifier, InMemoryUserStore, RoleLookup};
pub use policy::{AuthorizationPolicy, Decision, DenyReason};
pub use principal::Principal;
pub use token_service::{InvalidReason, TokenService, ValidationResult};
