pub mod chat;
pub mod comparison;
pub mod documents;
pub mod settings;
