mod merchant_auth;
mod request_id;

pub use merchant_auth::*;
pub use request_id::*;
