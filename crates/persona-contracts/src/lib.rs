pub mod catalog;
pub mod chat;
pub mod events;
pub mod models;
pub mod studio;
pub mod summary;
