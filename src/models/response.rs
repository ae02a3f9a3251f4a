use serde::Serialize;
use serde_json::Value;

/// Standard envelope for the listing endpoint.
#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub data: Vec<Value>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
