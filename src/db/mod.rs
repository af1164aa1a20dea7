pub mod fakes;
pub mod introspect;
pub mod session;

pub use introspect::{DbObjectState, get_dbstate, ghost};
pub use session::{PgSession, Session, SessionError};
