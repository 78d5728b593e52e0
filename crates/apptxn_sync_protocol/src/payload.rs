//! JSON representation of a transaction sent to the remote store.

use crate::error::ProtocolResult;
use crate::meta::RequestMeta;
use apptxn_core::{Transaction, TransactionLog};
use serde::{Deserialize, Serialize};

/// Device metadata of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentPayload {
    /// Device make / model.
    #[serde(rename = "deviceMake")]
    pub device_make: String,
    /// Operating system name.
    #[serde(rename = "deviceOS")]
    pub device_os: String,
    /// Operating system version.
    #[serde(rename = "deviceOSVersion")]
    pub device_os_version: String,
}

/// One log entry of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryPayload {
    /// Persist time, epoch milliseconds.
    pub timestamp: i64,
    /// Use-case event tag.
    pub usecase_event: i64,
    /// In-context error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_context_err_code: Option<i64>,
    /// In-context error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_context_err_desc: Option<String>,
}

impl From<&TransactionLog> for LogEntryPayload {
    fn from(log: &TransactionLog) -> Self {
        Self {
            timestamp: log.timestamp().as_millis(),
            usecase_event: log.usecase_event(),
            in_context_err_code: log.in_context_err_code(),
            in_context_err_desc: log.in_context_err_description().map(str::to_string),
        }
    }
}

/// A transaction and its logs, as the remote store receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    /// Globally unique transaction id; the remote deduplicates on it.
    pub guid: String,
    /// Business use-case tag.
    pub usecase: i64,
    /// Device metadata.
    pub user_agent: UserAgentPayload,
    /// Log entries in persistence order.
    pub logs: Vec<LogEntryPayload>,
}

impl From<&Transaction> for TransactionPayload {
    fn from(txn: &Transaction) -> Self {
        Self {
            guid: txn.guid().to_string(),
            usecase: txn.usecase(),
            user_agent: UserAgentPayload {
                device_make: txn.user_agent_device_make().to_string(),
                device_os: txn.user_agent_device_os().to_string(),
                device_os_version: txn.user_agent_device_os_version().to_string(),
            },
            logs: txn.logs().iter().map(LogEntryPayload::from).collect(),
        }
    }
}

/// A complete flush request: payload plus metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushRequest {
    /// The transaction being flushed.
    pub payload: TransactionPayload,
    /// Authentication and media-type metadata.
    pub meta: RequestMeta,
}

impl FlushRequest {
    /// Creates a request for `txn`.
    pub fn new(txn: &Transaction, meta: RequestMeta) -> Self {
        Self {
            payload: TransactionPayload::from(txn),
            meta,
        }
    }

    /// Guid of the transaction being flushed.
    pub fn guid(&self) -> &str {
        &self.payload.guid
    }

    /// Encodes the payload in the configured charset.
    pub fn encode_body(&self) -> ProtocolResult<Vec<u8>> {
        self.meta.charset.ensure_supported()?;
        Ok(serde_json::to_vec(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::meta::Charset;
    use apptxn_core::{DeviceInfo, LogEvent, TransactionRepository};

    fn meta(charset: Charset) -> RequestMeta {
        RequestMeta {
            auth_scheme: "fp-auth".into(),
            auth_token_param_name: "fp-token".into(),
            auth_token: "t".into(),
            charset,
            apptxn_media_type_version: "0.0.1".into(),
        }
    }

    fn logged_transaction() -> Transaction {
        let repo = TransactionRepository::open_in_memory().unwrap();
        let txn = repo
            .create_transaction_with_guid("guid-1", 7, &DeviceInfo::new("Pixel 8", "Android", "14"))
            .unwrap();
        repo.log_event(&txn, LogEvent::new(1)).unwrap();
        repo.log_event(&txn, LogEvent::error(2, 42, "boom")).unwrap();
        repo.transaction(txn.local_id()).unwrap().unwrap()
    }

    #[test]
    fn payload_preserves_fields_and_order() {
        let txn = logged_transaction();
        let payload = TransactionPayload::from(&txn);

        assert_eq!(payload.guid, "guid-1");
        assert_eq!(payload.usecase, 7);
        assert_eq!(payload.user_agent.device_make, "Pixel 8");
        assert_eq!(payload.logs.len(), 2);
        assert_eq!(payload.logs[0].usecase_event, 1);
        assert_eq!(payload.logs[1].in_context_err_code, Some(42));
        assert!(payload.logs[0].timestamp <= payload.logs[1].timestamp);
    }

    #[test]
    fn json_shape() {
        let txn = logged_transaction();
        let request = FlushRequest::new(&txn, meta(Charset::utf8()));
        let body = request.encode_body().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["guid"], "guid-1");
        assert_eq!(json["userAgent"]["deviceOS"], "Android");
        assert_eq!(json["userAgent"]["deviceOSVersion"], "14");
        assert_eq!(json["logs"][0]["usecaseEvent"], 1);
        assert!(json["logs"][0].get("inContextErrCode").is_none());
        assert_eq!(json["logs"][1]["inContextErrDesc"], "boom");
        assert_eq!(request.guid(), "guid-1");
    }

    #[test]
    fn unsupported_charset_is_rejected() {
        let txn = logged_transaction();
        let request = FlushRequest::new(&txn, meta(Charset::new("UTF-16")));
        assert!(matches!(
            request.encode_body(),
            Err(ProtocolError::UnsupportedCharset(_))
        ));
    }
}
