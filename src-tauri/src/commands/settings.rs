use crate::state::AppState;
use std::collections::BTreeMap;
use tauri::State;

/// Loaded configuration with API keys masked for display.
#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> BTreeMap<String, String> {
    state.settings()
}
