pub mod appointment;
pub mod conversation;
pub mod message;
pub mod patient;
pub mod payment;
