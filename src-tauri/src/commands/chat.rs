use crate::presentation::ChatLine;
use crate::state::AppState;
use tauri::State;

#[tauri::command]
pub async fn send_chat_message(
    state: State<'_, AppState>,
    content: String,
) -> Result<Vec<ChatLine>, String> {
    let content = content.trim();
    if content.is_empty() {
        return Err("Message is empty".into());
    }
    state.send_chat(content).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_chat_history(state: State<'_, AppState>) -> Vec<ChatLine> {
    state.chat_history()
}

#[tauri::command]
pub fn clear_chat_history(state: State<'_, AppState>) {
    state.clear_chat_history();
}
