use axum::{extract::State, Json};
use validator::Validate;

use crate::dto::question_dto::CreateQuestionRequest;
use crate::error::Result;
use crate::models::question::QuestionWithChoices;
use crate::services::question_service::QuestionService;

#[axum::debug_handler]
pub async fn create_question(
    State(service): State<QuestionService>,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<Json<QuestionWithChoices>> {
    req.validate()?;
    let question = service.create_question(req).await?;
    Ok(Json(question))
}

#[axum::debug_handler]
pub async fn list_questions(
    State(service): State<QuestionService>,
) -> Result<Json<Vec<QuestionWithChoices>>> {
    let questions = service.list_questions(50).await?;
    Ok(Json(questions))
}
