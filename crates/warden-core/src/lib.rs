//! Configuration loading and the default authorization service.

mod authorization;
mod config;

pub use authorization::{RequirementAuthorizationService, is_satisfied};
pub use config::{
    CONFIG_FILE_NAME, PolicyConfig, RemoteConfig, WardenConfig, default_config_dir, demo_config,
    load_config_from_dir, load_config_from_file, parse_config, validate_config,
    write_default_config_files,
};
