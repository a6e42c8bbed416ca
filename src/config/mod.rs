// src/config/mod.rs
pub mod app;
pub mod runtime;

pub use app::{
    AnalysisSettings, AppConfig, EmailCredentials, NotifySettings, PhoneCredential,
    SourceSettings,
};
pub use runtime::RuntimeSettings;
