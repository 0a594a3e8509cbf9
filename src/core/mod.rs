pub mod answer;
pub mod client;
pub mod config;
pub mod credentials;
pub mod expert;
pub mod keyring;
pub mod prompt;
pub mod response;
pub mod secrets;
