use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.llm.gemini_model, "gemini-1.5-flash");
    assert_eq!(config.llm.openai_model, "gpt-4o-mini");
}

#[test]
#[serial]
fn load_missing_file_yields_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config::load(dir.path()).expect("Failed to load config");
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.base_dir, dir.path());
}

#[test]
#[serial]
fn save_and_reload_round_trip() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::load(dir.path()).expect("Failed to load config");
    config.retrieval.top_k = 7;
    config.ollama.model = "all-minilm:latest".to_string();
    config.save().expect("Failed to save config");

    let reloaded = Config::load(dir.path()).expect("Failed to reload config");
    assert_eq!(reloaded.retrieval.top_k, 7);
    assert_eq!(reloaded.ollama.model, "all-minilm:latest");
}

#[test]
#[serial]
fn env_keys_override_file_values() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    // SAFETY: tests marked #[serial] so no concurrent env mutation
    unsafe {
        std::env::set_var("GEMINI_API_KEY", "env-gemini-key");
        std::env::set_var("OPENAI_API_KEY", "env-openai-key");
    }

    let config = Config::load(dir.path()).expect("Failed to load config");
    assert_eq!(config.llm.gemini_api_key, "env-gemini-key");
    assert_eq!(config.llm.openai_api_key, "env-openai-key");

    unsafe {
        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("OPENAI_API_KEY");
    }
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 200;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(200, 200))
    ));
}

#[test]
fn rejects_invalid_protocol() {
    let mut config = Config::default();
    config.ollama.protocol = "ftp".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn rejects_zero_top_k() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(0))));
}

#[test]
fn rejects_out_of_range_temperature() {
    let mut config = Config::default();
    config.llm.temperature = 3.5;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));
}

#[test]
fn store_dir_is_under_base_dir() {
    let mut config = Config::default();
    config.base_dir = PathBuf::from("/tmp/kb-rag-test");
    assert_eq!(config.store_dir(), PathBuf::from("/tmp/kb-rag-test/store"));
}
