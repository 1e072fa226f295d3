mod request;
mod session;
mod token;
mod user;

pub use request::StudentLogin;
pub use session::StudentSession;
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Rights, User};
