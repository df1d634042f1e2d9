//! Integration tests for the `validate` command.
use hydro_trader::cli::handle_validate_command;
use hydro_trader::settings::Settings;
use std::path::PathBuf;

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("models/norway")
}

/// An integration test for the `validate` command.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("HYDRO_TRADER_LOG_LEVEL", "off") };
    handle_validate_command(&get_model_dir(), Some(Settings::default())).unwrap();
}
