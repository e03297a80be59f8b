pub mod catalog;
pub mod notifications;
pub mod policy;
pub mod scheduler;
pub mod tickets;
pub mod users;

pub use catalog::CatalogService;
pub use notifications::{LogNotifier, PasswordResetNotifier};
pub use policy::{ScreeningDatePolicy, TicketBookingPolicy, TicketCancellingPolicy};
pub use scheduler::ScreeningScheduler;
pub use tickets::{Cancellation, TicketLifecycle};
pub use users::UserService;
