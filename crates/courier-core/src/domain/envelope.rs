//! Envelope - request/reply の返信フォーマット
//!
//! `data` は handler の戻り値を codec で encode 済みの bytes として運びます。
//! 受信側は一段の decode で呼び出し元の型に復元できます。

use serde::{Deserialize, Serialize};

/// Reply wrapper for request/reply interactions.
///
/// An empty `error` means success. When `error` is set it takes precedence
/// over `data` on the receiving side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Codec-encoded primary return value of the handler, if it declared one.
    pub data: Option<Vec<u8>>,
    /// Handler error message; empty on success.
    pub error: String,
}

impl Envelope {
    pub fn success(data: Option<Vec<u8>>) -> Self {
        Self {
            data,
            error: String::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Split into the data payload or the remote error message.
    pub fn into_result(self) -> Result<Option<Vec<u8>>, String> {
        if self.is_error() {
            Err(self.error)
        } else {
            Ok(self.data)
        }
    }
}
