mod settings;

pub use settings::{
    BackendSettings, PostgresSettings, RedisSettings, RuntimeSettings, load_runtime_settings,
    set_config_home_override,
};
