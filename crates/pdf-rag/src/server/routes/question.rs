//! Question answering endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{QuestionRequest, QuestionResponse};

/// POST /ask_question/ - Answer a question from the uploaded PDFs
pub async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>> {
    let start = Instant::now();
    tracing::info!("Question: {}", request.user_question);

    let outcome = state
        .service()
        .answer_question(&request.user_question)
        .await
        .inspect_err(|e| tracing::error!("Error processing question: {}", e))?;

    tracing::info!(
        "Answered from {} chunks in {:.1}s",
        outcome.chunks_retrieved,
        start.elapsed().as_secs_f64()
    );

    Ok(Json(QuestionResponse {
        answer: outcome.answer,
    }))
}
