pub mod data;
pub mod io;


pub use data::{
    path_display, Config, ExpertEntry, SecretsBackend, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_TEMPERATURE,
};
pub use io::{config_dir, write_atomically, ConfigError};
