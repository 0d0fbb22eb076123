pub mod session;

pub use session::{resolve_session, CurrentUser, SessionRef};
