pub mod gmail_api;

pub use gmail_api::GmailApi;
