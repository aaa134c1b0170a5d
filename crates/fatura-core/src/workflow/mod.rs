//! Invoice lifecycle: states, the in-memory store and the operator session.

mod session;
mod status;
mod store;

pub use session::{IngestReport, Session, TransitionReport};
pub use status::{Action, InvoiceStatus};
pub use store::InvoiceStore;
