// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API webhooks.
//!
//! Meta verifies a webhook once with a `hub.*` query challenge, then POSTs
//! `whatsapp_business_account` payloads whose
//! `entry[].changes[].value` objects carry the receiving number's
//! `metadata.phone_number_id` and a `messages[]` array.

use fluxbot_core::FluxbotError;
use fluxbot_core::types::InboundPayload;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

/// Header carrying `sha256=<hex hmac>` of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";

/// Query parameters of the subscription verification request.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Returns the challenge to echo when the request subscribes with the
/// expected token. An unset expected token never verifies.
pub fn verify_challenge(query: VerifyQuery, expected_token: Option<&str>) -> Option<String> {
    let expected = expected_token.map(str::trim).filter(|t| !t.is_empty())?;
    let observed = query.verify_token.as_deref().map(str::trim)?;
    if query.mode.as_deref() == Some("subscribe") && observed == expected {
        Some(query.challenge.unwrap_or_default())
    } else {
        None
    }
}

/// Check `X-Hub-Signature-256` against the raw body.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    app_secret: &str,
) -> Result<(), FluxbotError> {
    let digest_hex = signature_header
        .trim()
        .strip_prefix("sha256=")
        .ok_or_else(|| FluxbotError::Unauthorized("signature must use sha256=<hex>".into()))?;
    let expected = hex::decode(digest_hex)
        .map_err(|_| FluxbotError::Unauthorized("signature is not valid hex".into()))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes())
        .map_err(|e| FluxbotError::Internal(format!("hmac init failed: {e}")))?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| FluxbotError::Unauthorized("signature mismatch".into()))
}

fn value_objects(payload: &Value) -> impl Iterator<Item = &Value> {
    payload
        .get("entry")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("changes").and_then(Value::as_array))
        .flatten()
        .filter_map(|change| change.get("value").filter(|v| v.is_object()))
}

/// Every inbound message in the payload, paired with the phone number id
/// it was addressed to.
///
/// Non-text messages keep an empty body. Values without
/// `metadata.phone_number_id` and messages without a sender are skipped;
/// status-only callbacks yield nothing.
pub fn parse_webhook_messages(payload: &Value) -> Vec<(String, InboundPayload)> {
    if payload.get("object").and_then(Value::as_str) != Some(BUSINESS_ACCOUNT_OBJECT) {
        return Vec::new();
    }

    let mut out = Vec::new();
    for value in value_objects(payload) {
        let Some(phone_number_id) = value
            .pointer("/metadata/phone_number_id")
            .and_then(Value::as_str)
        else {
            continue;
        };
        let messages = value
            .get("messages")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for message in messages {
            let Some(from) = message.get("from").and_then(Value::as_str) else {
                continue;
            };
            let body = message
                .pointer("/text/body")
                .and_then(Value::as_str)
                .unwrap_or_default();
            out.push((
                phone_number_id.to_string(),
                InboundPayload {
                    from: from.to_string(),
                    to: phone_number_id.to_string(),
                    body: body.to_string(),
                    external_id: message.get("id").and_then(Value::as_str).map(String::from),
                },
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn query(mode: &str, token: &str, challenge: &str) -> VerifyQuery {
        VerifyQuery {
            mode: Some(mode.into()),
            verify_token: Some(token.into()),
            challenge: Some(challenge.into()),
        }
    }

    #[test]
    fn challenge_echoed_on_matching_token() {
        assert_eq!(
            verify_challenge(query("subscribe", "s3cret", "1158201444"), Some("s3cret")),
            Some("1158201444".to_string())
        );
    }

    #[test]
    fn challenge_rejected_on_mismatch_or_missing_config() {
        assert!(verify_challenge(query("subscribe", "wrong", "1"), Some("s3cret")).is_none());
        assert!(verify_challenge(query("unsubscribe", "s3cret", "1"), Some("s3cret")).is_none());
        assert!(verify_challenge(query("subscribe", "", "1"), None).is_none());
        assert!(verify_challenge(VerifyQuery::default(), Some("s3cret")).is_none());
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"object":"whatsapp_business_account"}"#;
        let header = sign(body, "app-secret");
        verify_signature(body, &header, "app-secret").unwrap();
        assert!(verify_signature(body, &header, "other-secret").is_err());
        assert!(verify_signature(b"tampered", &header, "app-secret").is_err());
    }

    #[test]
    fn malformed_signature_is_rejected() {
        assert!(verify_signature(b"{}", "md5=abcd", "k").is_err());
        assert!(verify_signature(b"{}", "sha256=zz", "k").is_err());
    }

    #[test]
    fn extracts_every_message_across_entries() {
        let payload = json!({
            "object": "whatsapp_business_account",
            "entry": [
                {"id": "WABA", "changes": [{"field": "messages", "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "15550001111", "phone_number_id": "1029"},
                    "messages": [
                        {"from": "5511", "id": "wamid.A", "type": "text", "text": {"body": "oi"}},
                        {"from": "5522", "id": "wamid.B", "type": "image", "image": {"id": "media"}}
                    ]
                }}]},
                {"id": "WABA2", "changes": [{"field": "messages", "value": {
                    "metadata": {"phone_number_id": "2048"},
                    "messages": [{"from": "5533", "id": "wamid.C", "type": "text", "text": {"body": "hey"}}]
                }}]}
            ]
        });

        let messages = parse_webhook_messages(&payload);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].0, "1029");
        assert_eq!(messages[0].1.body, "oi");
        assert_eq!(messages[0].1.to, "1029");
        assert_eq!(messages[1].1.body, "");
        assert_eq!(messages[1].1.external_id.as_deref(), Some("wamid.B"));
        assert_eq!(messages[2].0, "2048");
        assert_eq!(messages[2].1.from, "5533");
    }

    #[test]
    fn status_callbacks_and_foreign_objects_yield_nothing() {
        let statuses = json!({
            "object": "whatsapp_business_account",
            "entry": [{"changes": [{"value": {
                "metadata": {"phone_number_id": "1029"},
                "statuses": [{"id": "wamid.A", "status": "delivered"}]
            }}]}]
        });
        assert!(parse_webhook_messages(&statuses).is_empty());
        assert!(parse_webhook_messages(&json!({"object": "page", "entry": []})).is_empty());
        assert!(parse_webhook_messages(&json!("garbage")).is_empty());
    }
}
