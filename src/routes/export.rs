//! CSV download of the rolling history.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, info};

use super::AppState;
use crate::history::{self, EXPORT_FILE_NAME};
use crate::ExportError;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/history.csv", get(handler))
}

async fn handler(State(state): State<AppState>) -> Response {
    // ---
    let readings = state.view.borrow().history.clone();

    match history::to_csv(&readings) {
        Ok(csv) => {
            info!("Exporting {} readings as CSV", readings.len());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
                    ),
                ],
                csv,
            )
                .into_response()
        }
        Err(ExportError::Empty) => {
            (StatusCode::NOT_FOUND, ExportError::Empty.to_string()).into_response()
        }
        Err(e) => {
            error!("CSV export failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export history").into_response()
        }
    }
}
