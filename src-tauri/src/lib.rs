mod agents;
mod commands;
mod config;
mod db;
mod doc_processor;
mod embedding;
mod error;
mod llm;
mod pipeline;
mod presentation;
mod scores;
mod state;
mod storage;
mod telemetry;

use config::{AppConfig, LlmProviderKind, StorageBackend};
use db::Database;
use embedding::OpenAiEmbedder;
use llm::cache::CachedModel;
use llm::openai::OpenAiConfig;
use llm::{ChatModel, Provider, ProviderModel};
use state::AppState;
use std::path::Path;
use std::sync::Arc;
use storage::gcs::GcsBlobStore;
use storage::local::LocalBlobStore;
use storage::BlobStore;
use tauri::{Manager, RunEvent};
use tracing_subscriber::EnvFilter;

fn chat_model(config: &AppConfig, db: Arc<Database>) -> Arc<dyn ChatModel> {
    let llm = &config.llm;
    let provider = match llm.provider {
        LlmProviderKind::OpenAi => {
            Provider::openai(config.openai_api_key.clone(), llm.base_url.clone())
        }
        LlmProviderKind::Claude => Provider::claude(
            config.claude_api_key.clone().unwrap_or_default(),
            llm.base_url.clone(),
        ),
        LlmProviderKind::Ollama => Provider::ollama(llm.ollama_host.clone()),
    };
    tracing::info!(provider = provider.name(), model = %llm.model, "language model configured");
    let model = Arc::new(ProviderModel::new(provider, llm.model.clone()));
    Arc::new(CachedModel::new(model, db))
}

fn blob_store(config: &AppConfig, data_dir: &Path) -> error::Result<Arc<dyn BlobStore>> {
    match config.storage.backend {
        StorageBackend::Firebase => Ok(Arc::new(GcsBlobStore::new(
            config.service_account.clone(),
            config.storage_bucket.clone(),
        )?)),
        StorageBackend::Local => {
            let root = config
                .storage
                .local_dir
                .clone()
                .unwrap_or_else(|| data_dir.join("bucket"));
            let secret = config
                .storage
                .signing_secret
                .clone()
                .unwrap_or_else(|| config.service_account.private_key_id.clone());
            Ok(Arc::new(LocalBlobStore::new(root, secret)?))
        }
    }
}

fn build_state(config: AppConfig, data_dir: &Path) -> error::Result<AppState> {
    let db = Arc::new(Database::new(data_dir)?);
    let model = chat_model(&config, db.clone());
    // Embeddings always go through the OpenAI-compatible endpoint.
    let embedder = Arc::new(OpenAiEmbedder::new(
        OpenAiConfig {
            api_key: config.openai_api_key.clone(),
            base_url: match config.llm.provider {
                LlmProviderKind::OpenAi => config
                    .llm
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".into()),
                _ => "https://api.openai.com/v1".into(),
            },
        },
        config.llm.embedding_model.clone(),
    ));
    let blobs = blob_store(&config, data_dir)?;
    tracing::info!(
        backend = ?config.storage.backend,
        bucket = %config.storage_bucket,
        "blob store configured"
    );
    Ok(AppState::new(
        config,
        model,
        embedder,
        db,
        blobs,
        &data_dir.join("documents"),
    ))
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("transfer_master=info")),
        )
        .init();

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let secrets = config::secrets_path(&app.path().app_config_dir()?);
            tracing::info!(path = %secrets.display(), "loading configuration");
            let config = tauri::async_runtime::block_on(AppConfig::load(&secrets))?;
            let data_dir = app.path().app_data_dir()?;
            app.manage(build_state(config, &data_dir)?);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::documents::upload_document,
            commands::comparison::compare_documents,
            commands::comparison::default_weights,
            commands::chat::send_chat_message,
            commands::chat::get_chat_history,
            commands::chat::clear_chat_history,
            commands::settings::get_settings,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|handle, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = handle.try_state::<AppState>() {
                let telemetry = state.telemetry();
                tauri::async_runtime::block_on(telemetry.end_session(telemetry.outcome()));
            }
        }
    });
}
