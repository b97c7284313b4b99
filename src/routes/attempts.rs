use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use validator::Validate;

use crate::dto::attempt_dto::{AnswerAck, AnswerRequest, StartAttemptRequest};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::models::attempt::AttemptMode;
use crate::services::exam_flow::{
    AttemptResult, AttemptSummary, QuestionView, ReviewItem, StartAttempt,
};
use crate::AppState;

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartAttemptRequest>,
) -> Result<Json<AttemptSummary>> {
    req.validate()?;
    let user_id = claims.user_id()?;
    let mode = AttemptMode::parse(&req.mode)?;

    let mut rng = StdRng::from_entropy();
    let attempt = state
        .exam_flow
        .start_attempt(
            StartAttempt {
                mode,
                exam_name: req.exam_name,
                topics: req.topics,
                question_count: req.question_count,
                time_limit_seconds: req.time_limit_seconds,
            },
            user_id,
            &mut rng,
        )
        .await?;

    Ok(Json(AttemptSummary::from(attempt)))
}

#[axum::debug_handler]
pub async fn get_attempt_meta(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<Json<AttemptSummary>> {
    let user_id = claims.user_id()?;
    let summary = state.exam_flow.attempt_meta(attempt_id, user_id).await?;
    Ok(Json(summary))
}

#[axum::debug_handler]
pub async fn get_attempt_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((attempt_id, position)): Path<(i64, i32)>,
) -> Result<Json<QuestionView>> {
    let user_id = claims.user_id()?;
    let view = state
        .exam_flow
        .question_at(attempt_id, position, user_id)
        .await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn answer_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerAck>> {
    req.validate()?;
    let user_id = claims.user_id()?;
    let answered_at = state
        .exam_flow
        .record_answer(attempt_id, req.question_id, &req.selected_label, user_id)
        .await?;
    Ok(Json(AnswerAck {
        saved: true,
        question_id: req.question_id,
        answered_at,
    }))
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<Json<AttemptResult>> {
    let user_id = claims.user_id()?;
    let result = state.exam_flow.submit(attempt_id, user_id).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn get_attempt_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<Json<AttemptResult>> {
    let user_id = claims.user_id()?;
    let result = state.exam_flow.result(attempt_id, user_id).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn review_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<Json<Vec<ReviewItem>>> {
    let user_id = claims.user_id()?;
    let items = state.exam_flow.review(attempt_id, user_id).await?;
    Ok(Json(items))
}

#[axum::debug_handler]
pub async fn my_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<AttemptSummary>>> {
    let user_id = claims.user_id()?;
    let attempts = state.exam_flow.attempts_for_user(user_id).await?;
    Ok(Json(attempts))
}
