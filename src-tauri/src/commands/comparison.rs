use crate::pipeline::ComparisonWeights;
use crate::presentation::ComparisonView;
use crate::state::AppState;
use tauri::State;

#[tauri::command]
pub async fn compare_documents(
    state: State<'_, AppState>,
    weights: ComparisonWeights,
) -> Result<ComparisonView, String> {
    state.compare(weights).await.map_err(|e| e.to_string())
}

/// Slider positions the window starts with.
#[tauri::command]
pub fn default_weights() -> ComparisonWeights {
    ComparisonWeights::default()
}
