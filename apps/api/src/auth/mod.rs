// Authentication: identity provider port, local user mirror, credential
// verification and the request gate in front of protected routes.

pub mod gate;
pub mod handlers;
pub mod identity;
pub mod password;
pub mod users;
pub mod verifier;
