pub mod film;
pub mod hall;
pub mod screening;
pub mod ticket;
pub mod user;

pub use film::{Film, FilmCategory, FilmFilter, NewFilm};
pub use hall::{Hall, HallSeat, LayoutError, SeatLayout, SeatPosition};
pub use screening::{
    Screening, ScreeningDraft, ScreeningSummary, ScreeningWindow, SeatSlot, SeatView, SlotConflict,
};
pub use ticket::{Ticket, TicketStatus, TicketView};
pub use user::{NewUser, User, UserRole};
