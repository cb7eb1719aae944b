use serde::{Deserialize, Serialize};

/// Request body for `POST /messages`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    pub content: String,
}

/// Response body for `POST /messages`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
