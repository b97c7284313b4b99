use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChoiceInput {
    pub label: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, message = "Question text must not be empty"))]
    pub text: String,
    pub explanation: Option<String>,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub exam_name: Option<String>,
    pub question_number: Option<i32>,
    #[validate(length(min = 2, max = 4, message = "A question needs 2 to 4 choices"))]
    pub choices: Vec<ChoiceInput>,
}
