//! Organisations (tenants) and their seat licensing.

pub mod organisation;
pub mod seats;

pub use organisation::Organisation;
pub use seats::{SeatChangeRequest, SeatRequestStatus};
