//! Protocol-visible errors and their JSON-RPC codes

use thiserror::Error;

use crate::protocol::JsonRpcError;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const TASK_NOT_FOUND: i64 = -32001;
pub const TASK_NOT_CANCELABLE: i64 = -32002;
pub const UNSUPPORTED_OPERATION: i64 = -32004;

const INTERNAL_ERROR_DETAIL: &str = "request could not be completed";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum A2aError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Task cannot be canceled: {0}")]
    TaskNotCancelable(String),
    #[error("This operation is not supported")]
    UnsupportedOperation,
}

impl A2aError {
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Internal(_) => INTERNAL_ERROR,
            Self::TaskNotFound(_) => TASK_NOT_FOUND,
            Self::TaskNotCancelable(_) => TASK_NOT_CANCELABLE,
            Self::UnsupportedOperation => UNSUPPORTED_OPERATION,
        }
    }

    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
        }
    }

    /// Generic internal failure; the cause is logged where it happens and
    /// never sent to the caller
    pub fn internal() -> Self {
        Self::Internal(INTERNAL_ERROR_DETAIL.to_string())
    }
}
