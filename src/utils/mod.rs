pub mod envelope;
pub mod settings_cache;
