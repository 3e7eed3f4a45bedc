//! Pure transform of one provider message into the persisted record.

use crate::db::models::EmailRecord;
use crate::error::SinkError;
use crate::types::gmail::{MessageHeader, MessagePayload, RawMessage};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::DateTime;

/// Gmail body data is base64url; tolerate both padded and unpadded forms.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn normalize(raw: &RawMessage) -> Result<EmailRecord, SinkError> {
    let payload = raw.payload.as_ref().ok_or_else(|| {
        SinkError::MalformedMessage(format!("message {} has no payload", raw.id))
    })?;
    let headers = payload.headers.as_deref().ok_or_else(|| {
        SinkError::MalformedMessage(format!("message {} has no headers", raw.id))
    })?;

    let internal_date = raw.internal_date.clone().unwrap_or_default();
    let millis: i64 = internal_date.parse().map_err(|_| {
        SinkError::MalformedMessage(format!(
            "message {} has unparseable internalDate {:?}",
            raw.id, internal_date
        ))
    })?;
    let received_date = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        SinkError::MalformedMessage(format!(
            "message {} internalDate {} is out of range",
            raw.id, millis
        ))
    })?;

    Ok(EmailRecord {
        external_id: raw.id.clone(),
        thread_id: raw.thread_id.clone().unwrap_or_default(),
        label_ids: raw.label_ids.clone(),
        snippet: raw.snippet.clone(),
        history_id: raw.history_id.clone().unwrap_or_default(),
        internal_date,
        payload: serde_json::to_value(payload)?,
        size_estimate: raw.size_estimate.unwrap_or_default(),
        raw: raw.raw.clone(),
        sender: extract_header(headers, "From"),
        received_date,
        subject: extract_header(headers, "Subject"),
        body: extract_body(payload, &raw.id)?,
    })
}

/// First header whose name matches case-insensitively, or empty string.
pub fn extract_header(headers: &[MessageHeader], name: &str) -> String {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
        .unwrap_or_default()
}

/// Concatenate every `text/plain` and `text/html` part in order; a payload
/// with no parts decodes its single inline body instead. Other MIME types
/// and nested multiparts are skipped, not recursed into, so a
/// multipart/alternative message yields both text variants back-to-back.
fn extract_body(payload: &MessagePayload, id: &str) -> Result<String, SinkError> {
    let Some(parts) = payload.parts.as_ref() else {
        return decode_part_data(payload.body.as_ref().and_then(|b| b.data.as_deref()), id);
    };

    let mut body = String::new();
    for part in parts {
        match part.mime_type.as_deref() {
            Some("text/plain") | Some("text/html") => {
                body.push_str(&decode_part_data(
                    part.body.as_ref().and_then(|b| b.data.as_deref()),
                    id,
                )?);
            }
            _ => {}
        }
    }
    Ok(body)
}

fn decode_part_data(data: Option<&str>, id: &str) -> Result<String, SinkError> {
    let data = data.ok_or_else(|| {
        SinkError::MalformedMessage(format!("message {id} has a text part without body data"))
    })?;
    let bytes = BODY_ENGINE.decode(data).map_err(|e| {
        SinkError::MalformedMessage(format!("message {id} has undecodable body data: {e}"))
    })?;
    String::from_utf8(bytes).map_err(|e| {
        SinkError::MalformedMessage(format!("message {id} body is not valid UTF-8: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn b64(s: &str) -> String {
        BODY_ENGINE.encode(s)
    }

    fn raw_message(payload: serde_json::Value) -> RawMessage {
        serde_json::from_value(json!({
            "id": "m1",
            "threadId": "t1",
            "labelIds": ["INBOX"],
            "snippet": "snippet",
            "historyId": "42",
            "internalDate": "1700000000000",
            "sizeEstimate": 2048,
            "payload": payload
        }))
        .expect("valid raw message fixture")
    }

    #[test]
    fn header_extraction_is_case_insensitive() {
        let headers = vec![
            MessageHeader {
                name: "from".to_string(),
                value: "a@example.com".to_string(),
            },
            MessageHeader {
                name: "Subject".to_string(),
                value: "hi".to_string(),
            },
        ];
        assert_eq!(extract_header(&headers, "From"), "a@example.com");
        assert_eq!(extract_header(&headers, "SUBJECT"), "hi");
    }

    #[test]
    fn absent_header_yields_empty_string() {
        assert_eq!(extract_header(&[], "From"), "");
    }

    #[test]
    fn first_matching_header_wins() {
        let headers = vec![
            MessageHeader {
                name: "From".to_string(),
                value: "first@example.com".to_string(),
            },
            MessageHeader {
                name: "FROM".to_string(),
                value: "second@example.com".to_string(),
            },
        ];
        assert_eq!(extract_header(&headers, "from"), "first@example.com");
    }

    #[test]
    fn body_concatenates_text_parts_in_order_and_skips_others() {
        let raw = raw_message(json!({
            "headers": [{"name": "From", "value": "a@example.com"}],
            "parts": [
                {"mimeType": "text/plain", "body": {"data": b64("A")}},
                {"mimeType": "image/png", "body": {"data": b64("ignored")}},
                {"mimeType": "text/html", "body": {"data": b64("<b>B</b>")}}
            ]
        }));
        let record = normalize(&raw).unwrap();
        assert_eq!(record.body, "A<b>B</b>");
    }

    #[test]
    fn nested_multiparts_are_not_recursed_into() {
        let raw = raw_message(json!({
            "headers": [],
            "parts": [
                {"mimeType": "multipart/alternative", "parts": [
                    {"mimeType": "text/plain", "body": {"data": b64("inner")}}
                ]},
                {"mimeType": "text/plain", "body": {"data": b64("outer")}}
            ]
        }));
        let record = normalize(&raw).unwrap();
        assert_eq!(record.body, "outer");
    }

    #[test]
    fn single_inline_body_decodes() {
        let raw = raw_message(json!({
            "headers": [],
            "body": {"data": b64("hello")}
        }));
        let record = normalize(&raw).unwrap();
        assert_eq!(record.body, "hello");
    }

    #[test]
    fn padded_base64url_also_decodes() {
        // "hi" encodes to "aGk=" with padding
        let raw = raw_message(json!({
            "headers": [],
            "body": {"data": "aGk="}
        }));
        assert_eq!(normalize(&raw).unwrap().body, "hi");
    }

    #[test]
    fn received_date_derives_from_internal_date() {
        let raw = raw_message(json!({
            "headers": [],
            "body": {"data": b64("x")}
        }));
        let record = normalize(&raw).unwrap();
        assert_eq!(
            record.received_date,
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
        );
    }

    #[test]
    fn derived_fields_come_from_headers() {
        let raw = raw_message(json!({
            "headers": [
                {"name": "From", "value": "sender@example.com"},
                {"name": "Subject", "value": "the subject"}
            ],
            "body": {"data": b64("x")}
        }));
        let record = normalize(&raw).unwrap();
        assert_eq!(record.sender, "sender@example.com");
        assert_eq!(record.subject, "the subject");
        assert_eq!(record.external_id, "m1");
        assert_eq!(record.thread_id, "t1");
        assert_eq!(record.size_estimate, 2048);
    }

    #[test]
    fn missing_payload_is_malformed() {
        let raw: RawMessage = serde_json::from_value(json!({
            "id": "m1",
            "internalDate": "1700000000000"
        }))
        .unwrap();
        assert!(matches!(
            normalize(&raw).unwrap_err(),
            SinkError::MalformedMessage(_)
        ));
    }

    #[test]
    fn missing_headers_is_malformed() {
        let raw = raw_message(json!({
            "body": {"data": b64("x")}
        }));
        assert!(matches!(
            normalize(&raw).unwrap_err(),
            SinkError::MalformedMessage(_)
        ));
    }

    #[test]
    fn unparseable_internal_date_is_malformed() {
        let mut raw = raw_message(json!({
            "headers": [],
            "body": {"data": b64("x")}
        }));
        raw.internal_date = Some("not-a-number".to_string());
        assert!(matches!(
            normalize(&raw).unwrap_err(),
            SinkError::MalformedMessage(_)
        ));
    }

    #[test]
    fn text_part_without_data_is_malformed() {
        let raw = raw_message(json!({
            "headers": [],
            "parts": [{"mimeType": "text/plain", "body": {"size": 0}}]
        }));
        assert!(matches!(
            normalize(&raw).unwrap_err(),
            SinkError::MalformedMessage(_)
        ));
    }
}
