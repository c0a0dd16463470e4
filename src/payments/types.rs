//! Wire types for the Daraja (M-Pesa) API.
//!
//! Field names mirror the gateway's JSON exactly via serde renames; nothing
//! in here should leak past the payments module boundary except through the
//! typed responses.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: i64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Initiation acknowledgment. The push itself completes asynchronously; the
/// final result arrives on the callback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct B2cRequest {
    #[serde(rename = "InitiatorName")]
    pub initiator_name: String,
    #[serde(rename = "SecurityCredential")]
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: String,
    #[serde(rename = "Amount")]
    pub amount: i64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "Remarks")]
    pub remarks: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
    #[serde(rename = "Occasion")]
    pub occasion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct B2cResponse {
    #[serde(rename = "OriginatorConversationID", default)]
    pub originator_conversation_id: Option<String>,
    #[serde(rename = "ConversationID", default)]
    pub conversation_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
}

#[derive(Debug, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode", default)]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "ResultCode", default)]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
}

/// Acknowledgment the gateway expects from every callback endpoint. Always
/// sent with code 0: a non-zero code triggers gateway-side redelivery, which
/// must never be coupled to our internal processing outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn received() -> Self {
        Self {
            result_code: 0,
            result_desc: "Success".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackMetadataItem>,
}

/// The gateway reports metadata as a flat `{Name, Value}` list with no
/// guaranteed order. `Value` may be a number or a string depending on the
/// item.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<JsonValue>,
}

/// Named fields pivoted out of the metadata item list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StkCallbackDetails {
    pub amount: Option<i64>,
    pub mpesa_receipt: Option<String>,
    pub transaction_date: Option<i64>,
    pub phone_number: Option<String>,
}

impl CallbackMetadata {
    pub fn pivot(&self) -> StkCallbackDetails {
        let mut details = StkCallbackDetails::default();
        for item in &self.items {
            let value = match &item.value {
                Some(v) => v,
                None => continue,
            };
            match item.name.as_str() {
                "Amount" => details.amount = as_whole_units(value),
                "MpesaReceiptNumber" => details.mpesa_receipt = as_string(value),
                "TransactionDate" => details.transaction_date = value.as_i64(),
                "PhoneNumber" => details.phone_number = as_string(value),
                _ => {}
            }
        }
        details
    }
}

fn as_whole_units(value: &JsonValue) -> Option<i64> {
    // The gateway sends whole-shilling amounts, occasionally as "500.0".
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok()).map(|f| f as i64))
}

fn as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_payload() -> serde_json::Value {
        serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 500.0},
                            {"Name": "MpesaReceiptNumber", "Value": "ABC123"},
                            {"Name": "TransactionDate", "Value": 20250820154707u64},
                            {"Name": "PhoneNumber", "Value": 254712345678u64}
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn stk_callback_parses_and_pivots_metadata() {
        let envelope: StkCallbackEnvelope =
            serde_json::from_value(success_payload()).expect("payload should parse");
        let callback = envelope.body.stk_callback;
        assert!(callback.is_success());
        assert_eq!(callback.checkout_request_id, "ws_CO_191220191020363925");

        let details = callback
            .callback_metadata
            .expect("metadata present on success")
            .pivot();
        assert_eq!(details.amount, Some(500));
        assert_eq!(details.mpesa_receipt.as_deref(), Some("ABC123"));
        assert_eq!(details.phone_number.as_deref(), Some("254712345678"));
        assert_eq!(details.transaction_date, Some(20250820154707));
    }

    #[test]
    fn metadata_pivot_ignores_item_order() {
        let metadata: CallbackMetadata = serde_json::from_value(serde_json::json!({
            "Item": [
                {"Name": "PhoneNumber", "Value": "254712345678"},
                {"Name": "Balance"},
                {"Name": "Amount", "Value": 120},
                {"Name": "MpesaReceiptNumber", "Value": "XYZ9"}
            ]
        }))
        .expect("metadata should parse");

        let details = metadata.pivot();
        assert_eq!(details.amount, Some(120));
        assert_eq!(details.mpesa_receipt.as_deref(), Some("XYZ9"));
        assert_eq!(details.phone_number.as_deref(), Some("254712345678"));
        assert_eq!(details.transaction_date, None);
    }

    #[test]
    fn failed_callback_has_no_metadata() {
        let envelope: StkCallbackEnvelope = serde_json::from_value(serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        }))
        .expect("payload should parse");

        let callback = envelope.body.stk_callback;
        assert!(!callback.is_success());
        assert!(callback.callback_metadata.is_none());
    }

    #[test]
    fn stk_push_request_serializes_gateway_field_names() {
        let request = StkPushRequest {
            business_short_code: "174379".to_string(),
            password: "cGFzcw==".to_string(),
            timestamp: "20250820154707".to_string(),
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: 500,
            party_a: "254712345678".to_string(),
            party_b: "174379".to_string(),
            phone_number: "254712345678".to_string(),
            callback_url: "https://example.com/api/mpesa/callback".to_string(),
            account_reference: "DEPOSIT_u1_1".to_string(),
            transaction_desc: "SpinCash Deposit".to_string(),
        };
        let json = serde_json::to_value(&request).expect("serialization should succeed");
        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["Amount"], 500);
        assert_eq!(json["CallBackURL"], "https://example.com/api/mpesa/callback");
    }

    #[test]
    fn callback_ack_always_reports_zero() {
        let ack = CallbackAck::received();
        let json = serde_json::to_value(&ack).expect("serialization should succeed");
        assert_eq!(json["ResultCode"], 0);
        assert_eq!(json["ResultDesc"], "Success");
    }
}
