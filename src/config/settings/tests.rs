use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
    assert_eq!(config.provider.batch_size, 64);
    assert_eq!(config.provider.retry_attempts, 1);
    assert!(!config.provider.accept_invalid_certs);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.index.top_k, 4);
    assert_eq!(config.index.snippet_length, 500);
    assert_eq!(
        config.index.fields,
        vec![
            "defect_description",
            "process_parameters",
            "inspection_result"
        ]
    );
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.provider.base_url = "not a url".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.provider.base_url = "ftp://example.com".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.provider.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.provider.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.provider.retry_attempts = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.index.top_k = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.index.fields = vec![" ".to_string()];
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::EmptyFields)
    ));
}

#[test]
fn chunk_overlap_must_be_smaller_than_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 100;
    config.chunking.chunk_overlap = 100;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkOverlap(100, 100))
    ));

    config.chunking.chunk_overlap = 99;
    assert!(config.validate().is_ok());
}

#[test]
fn provider_url_keeps_path_prefix() {
    let mut config = Config::default();
    config.provider.base_url = "https://gateway.internal/openai/v1".to_string();

    let url = config
        .provider_url()
        .expect("should generate provider url successfully");
    assert_eq!(url.as_str(), "https://gateway.internal/openai/v1/");
    assert_eq!(
        url.join("embeddings")
            .expect("should join embeddings path")
            .as_str(),
        "https://gateway.internal/openai/v1/embeddings"
    );
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_section_defaults() {
    let parsed: Config = toml::from_str(
        r#"
            [provider]
            chat_model = "deepseek-chat"

            [index]
            top_k = 8
        "#,
    )
    .expect("should parse partial toml");

    assert_eq!(parsed.provider.chat_model, "deepseek-chat");
    assert_eq!(parsed.provider.batch_size, 64);
    assert_eq!(parsed.index.top_k, 8);
    assert_eq!(parsed.index.snippet_length, 500);
    assert_eq!(parsed.chunking, ChunkingConfig::default());
}

#[test]
fn setter_validation() {
    let mut provider = ProviderConfig::default();

    assert!(
        provider
            .set_base_url("http://localhost:8080/v1".to_string())
            .is_ok()
    );
    assert!(provider.set_chat_model("local-chat".to_string()).is_ok());
    assert!(
        provider
            .set_embedding_model("local-embed".to_string())
            .is_ok()
    );
    assert!(provider.set_batch_size(128).is_ok());

    assert!(provider.set_base_url("::".to_string()).is_err());
    assert!(provider.set_chat_model("  ".to_string()).is_err());
    assert!(provider.set_embedding_model(String::new()).is_err());
    assert!(provider.set_batch_size(0).is_err());
    assert!(provider.set_batch_size(4096).is_err());

    assert_eq!(provider.base_url, "http://localhost:8080/v1");
    assert_eq!(provider.batch_size, 128);
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load default config");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.provider, ProviderConfig::default());
    assert_eq!(config.persist_dir(), temp_dir.path().join("index"));
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.provider.chat_model = "deepseek-chat".to_string();
    config.index.persist_dir = Some(temp_dir.path().join("chroma_index"));

    config.save().expect("should save config");
    assert!(config.config_file_path().exists());

    let loaded = Config::load(temp_dir.path().join("nested")).expect("should load config");
    assert_eq!(loaded, config);
    assert_eq!(loaded.persist_dir(), temp_dir.path().join("chroma_index"));
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 10\nchunk_overlap = 20\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn overrides_from_lookup() {
    let mut config = Config::default();
    config.apply_overrides(|key| match key {
        "GENAI_BASE_URL" => Some("http://llm.local:9000/v1".to_string()),
        "GENAI_API_KEY" => Some("secret".to_string()),
        "EMBED_MODEL" => Some("bge-m3".to_string()),
        "CHAT_MODEL" => Some("   ".to_string()),
        _ => None,
    });

    assert_eq!(config.provider.base_url, "http://llm.local:9000/v1");
    assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
    assert_eq!(config.provider.embedding_model, "bge-m3");
    assert_eq!(
        config.provider.chat_model,
        ProviderConfig::default().chat_model
    );
    assert_eq!(config.index.persist_dir, None);
}

#[test]
#[serial]
fn load_with_env_applies_process_environment() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index_dir = temp_dir.path().join("from-env");

    // SAFETY: serialised with the other environment-mutating tests.
    unsafe {
        std::env::set_var("INDEX_PERSIST_DIR", &index_dir);
    }
    let config = Config::load_with_env(temp_dir.path());
    // SAFETY: as above.
    unsafe {
        std::env::remove_var("INDEX_PERSIST_DIR");
    }

    let config = config.expect("should load config with env overrides");
    assert_eq!(config.persist_dir(), index_dir);
}
