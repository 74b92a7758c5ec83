//! Prediction handlers
//!
//! Inference is CPU-bound, so each request's pipeline runs on the blocking
//! pool and the async workers stay free for I/O.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Query, State,
    },
    Json,
};
use netflow_detector_core::{read_csv, DetectorResult, PredictionService, Row};

use crate::models::{ModelQuery, PredictResponse, SinglePredictResponse};
use crate::{AppError, AppResult, AppState};

/// Predict a batch of feature records
pub async fn predict(
    State(state): State<AppState>,
    query: Result<Query<ModelQuery>, QueryRejection>,
    payload: Result<Json<Vec<Row>>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Query(query) = query?;
    let Json(rows) = payload?;
    let model = state.model_or_default(query);

    let results = run_blocking(&state.service, model.clone(), move |service, model| {
        service.predict_on_rows(&rows, model)
    })
    .await?;

    Ok(Json(PredictResponse { model, results }))
}

/// Predict one feature record
pub async fn predict_single(
    State(state): State<AppState>,
    query: Result<Query<ModelQuery>, QueryRejection>,
    payload: Result<Json<Row>, JsonRejection>,
) -> AppResult<Json<SinglePredictResponse>> {
    let Query(query) = query?;
    let Json(row) = payload?;
    let model = state.model_or_default(query);

    let results = run_blocking(&state.service, model.clone(), move |service, model| {
        service.predict_one(&row, model)
    })
    .await?;

    Ok(Json(SinglePredictResponse { model, results }))
}

/// Predict every record of an uploaded CSV (multipart field `file`)
pub async fn predict_file(
    State(state): State<AppState>,
    query: Result<Query<ModelQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Query(query) = query?;
    let mut multipart = multipart?;
    let model = state.model_or_default(query);
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(AppError::ValidationError("Only CSV files are supported".to_string()));
        }

        let data = field.bytes().await?;
        tracing::debug!("Received upload {} ({} bytes)", file_name, data.len());
        upload = Some(data);
        break;
    }

    let data = upload.ok_or_else(|| AppError::ValidationError("No file uploaded".to_string()))?;

    let results = run_blocking(&state.service, model.clone(), move |service, model| {
        let table = read_csv(&data)?;
        service.check_columns(model, table.columns())?;
        service.predict_on_rows(&table.rows, model)
    })
    .await?;

    Ok(Json(PredictResponse { model, results }))
}

async fn run_blocking<T, F>(service: &PredictionService, model: String, job: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&PredictionService, &str) -> DetectorResult<T> + Send + 'static,
{
    let service = service.clone();
    let result = tokio::task::spawn_blocking(move || job(&service, &model)).await?;
    result.map_err(AppError::from)
}
