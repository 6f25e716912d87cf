use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    /// HTTP-style status: 200, 400 for bad uploads, 500 otherwise
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct CommandResult {
    pub status: u16,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            status: 200,
            data: Some(data),
            error: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: 400,
            data: None,
            error: Some(msg.into()),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: 500,
            data: None,
            error: Some(msg.into()),
        }
    }

    pub fn into_response(self, id: String) -> Response {
        Response {
            id,
            success: self.status == 200,
            status: self.status,
            result: self.data,
            error: self.error,
        }
    }
}

impl From<Error> for CommandResult {
    fn from(e: Error) -> Self {
        Self {
            status: e.status(),
            data: None,
            error: Some(e.to_string()),
        }
    }
}
