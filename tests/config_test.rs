use std::fs;
use tempfile::TempDir;
use vade::config::{AppConfig, ConfigManager};

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

fn write_user_config(config_manager: &ConfigManager, content: &str) {
    config_manager
        .ensure_config_dir()
        .expect("Failed to create config dir");
    fs::write(config_manager.config_path("config.toml"), content)
        .expect("Failed to write config");
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");

    assert_eq!(config.display.page_size, 50);
    assert_eq!(config.display.max_cell_chars, 50);
    assert!(!config.display.row_numbers);

    assert_eq!(config.assistant.chunk_size, 100);

    assert!(config.file_loading.delimiter.is_none());
    assert!(config.file_loading.compression.is_none());

    assert!(!config.debug.enabled);
    assert_eq!(config.debug.log_level, "info");
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config();

    assert!(template.contains("[file_loading]"));
    assert!(template.contains("[display]"));
    assert!(template.contains("[assistant]"));
    assert!(template.contains("[debug]"));
    assert!(template.contains("version = \"0.1\""));
}

#[test]
fn test_write_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let config_path = config_manager
        .write_default_config(false)
        .expect("Failed to write config");

    assert!(config_path.exists());
    let content = fs::read_to_string(&config_path).expect("Failed to read config");
    assert!(content.contains("[display]"));
}

#[test]
fn test_write_config_without_force_fails_if_exists() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    config_manager
        .write_default_config(false)
        .expect("First write should succeed");

    let result = config_manager.write_default_config(false);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("already exists"));
}

#[test]
fn test_write_config_with_force_overwrites() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let first_path = config_manager
        .write_default_config(false)
        .expect("First write should succeed");
    fs::write(&first_path, "garbage").unwrap();

    let second_path = config_manager
        .write_default_config(true)
        .expect("Second write with force should succeed");

    assert_eq!(first_path, second_path);
    let content = fs::read_to_string(&second_path).unwrap();
    assert!(content.contains("[assistant]"));
}

#[test]
fn test_load_config_with_no_file() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let config = AppConfig::load_from(&config_manager).expect("Should load default config");

    assert_eq!(config.version, "0.1");
    assert_eq!(config.display.page_size, 50);
}

#[test]
fn test_load_minimal_user_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_user_config(
        &config_manager,
        r#"
version = "0.1"

[display]
page_size = 20
row_numbers = true

[file_loading]
delimiter = 59
"#,
    );

    let config = AppConfig::load_from(&config_manager).expect("Should load config");

    assert_eq!(config.display.page_size, 20);
    assert!(config.display.row_numbers);
    assert_eq!(config.file_loading.delimiter, Some(b';'));

    // Unspecified values keep their defaults
    assert_eq!(config.display.max_cell_chars, 50);
    assert_eq!(config.assistant.chunk_size, 100);

    let session = config.session_config(None);
    assert_eq!(session.page_size, 20);
    assert_eq!(session.delimiter, b';');
}

#[test]
fn test_load_rejects_invalid_user_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_user_config(&config_manager, "[display]\npage_size = \"many\"\n");

    let result = AppConfig::load_from(&config_manager);
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to parse config file"));
}

#[test]
fn test_load_validates_user_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_user_config(&config_manager, "[assistant]\nchunk_size = 0\n");

    let result = AppConfig::load_from(&config_manager);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("chunk_size"));
}

#[test]
fn test_merge_configs() {
    let mut base = AppConfig::default();
    let mut override_config = AppConfig::default();

    override_config.display.row_numbers = true;
    override_config.display.page_size = 10;
    override_config.assistant.chunk_size = 25;
    override_config.debug.log_level = "warn".to_string();

    base.merge(override_config);

    assert!(base.display.row_numbers);
    assert_eq!(base.display.page_size, 10);
    assert_eq!(base.assistant.chunk_size, 25);
    assert_eq!(base.debug.log_level, "warn");

    assert_eq!(base.display.max_cell_chars, 50);
    assert!(!base.debug.enabled);
}

#[test]
fn test_merge_option_fields() {
    let mut base = AppConfig::default();
    base.file_loading.delimiter = Some(b'\t');
    base.file_loading.ignore_errors = Some(false);

    let mut other = AppConfig::default();
    other.file_loading.compression = Some("zstd".to_string());

    base.merge(other);

    // None in the override does not clear a value
    assert_eq!(base.file_loading.delimiter, Some(b'\t'));
    assert_eq!(base.file_loading.ignore_errors, Some(false));
    assert_eq!(base.file_loading.compression.as_deref(), Some("zstd"));
}

#[test]
fn test_merge_does_not_override_with_defaults() {
    let mut base = AppConfig::default();
    base.display.page_size = 10;

    base.merge(AppConfig::default());

    assert_eq!(base.display.page_size, 10);
}

#[test]
fn test_validate_config_valid() {
    assert!(AppConfig::default().validate().is_ok());
}

#[test]
fn test_validate_config_invalid_version() {
    let config = AppConfig {
        version: "1.0".to_string(),
        ..AppConfig::default()
    };

    let result = config.validate();
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Unsupported config version"));
}

#[test]
fn test_validate_config_zero_page_size() {
    let mut config = AppConfig::default();
    config.display.page_size = 0;

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("page_size"));
}

#[test]
fn test_validate_config_log_level() {
    let mut config = AppConfig::default();
    config.debug.log_level = "DEBUG".to_string();
    assert!(config.validate().is_ok());

    config.debug.log_level = "loud".to_string();
    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Invalid log_level"));
}

#[test]
fn test_validate_config_compression() {
    let mut config = AppConfig::default();
    config.file_loading.compression = Some("lzma".to_string());

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Invalid compression"));
}
