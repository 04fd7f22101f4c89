pub mod accounts;
pub mod events;
pub mod locations;
pub mod meta;
pub mod reservations;
pub mod uploads;
pub mod users;
