use crate::presentation::UploadedDocument;
use crate::state::{AppState, DocumentSlot};
use std::path::PathBuf;
use tauri::State;

/// Store the picked file for `slot`. No file picked means no change.
#[tauri::command]
pub async fn upload_document(
    state: State<'_, AppState>,
    slot: DocumentSlot,
    file_path: Option<String>,
) -> Result<Option<UploadedDocument>, String> {
    let path = file_path.map(PathBuf::from);
    state
        .upload(slot, path.as_deref())
        .await
        .map_err(|e| e.to_string())
}
