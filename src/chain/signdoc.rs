// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Amino sign-doc reconstruction.
//!
//! Signers wrap the request payload in a zero-fee amino `StdSignDoc` whose
//! single message carries the bech32 signer address and the payload
//! pretty-printed with two-space indentation. Verification rebuilds that
//! document byte-for-byte: keys sorted, compact separators, and the HTML
//! characters `&`, `<`, `>` escaped as unicode sequences.
//!
//! The payload itself is embedded in wire field order, which is why the
//! crate enables serde_json's `preserve_order`.

use serde_json::{json, Value};

/// Serialize the sign-doc for a signed request payload.
///
/// `data` is the payload exactly as received (including the `auth` block),
/// `signer` the bech32 address derived from the auth public key.
pub fn serialize_sign_doc(
    msg_type: &str,
    signer: &str,
    data: &Value,
    chain_id: &str,
    fee_denom: &str,
) -> String {
    // Matches JSON.stringify(data, null, 2) on the signing side.
    let pretty_data = serde_json::to_string_pretty(data)
        .unwrap_or_else(|_| "null".to_string());

    // Keys are written in sorted order at every level; the payload string is
    // opaque at this point and keeps its own ordering.
    let doc = json!({
        "account_number": "0",
        "chain_id": chain_id,
        "fee": {
            "amount": [
                {
                    "amount": "0",
                    "denom": fee_denom,
                }
            ],
            "gas": "0",
        },
        "memo": "",
        "msgs": [
            {
                "type": msg_type,
                "value": {
                    "data": pretty_data,
                    "signer": signer,
                }
            }
        ],
        "sequence": "0",
    });

    let compact = serde_json::to_string(&doc).unwrap_or_default();
    escape_html_characters(&compact)
}

/// Escape `&`, `<`, `>` the way amino JSON serialization does.
fn escape_html_characters(input: &str) -> String {
    input
        .replace('&', "\\u0026")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_doc_layout_is_sorted_and_compact() {
        let data = json!({ "auth": { "nonce": 0 } });
        let doc = serialize_sign_doc("sign/MsgSignData", "juno1signer", &data, "juno-1", "ujuno");

        let expected = concat!(
            r#"{"account_number":"0","chain_id":"juno-1","#,
            r#""fee":{"amount":[{"amount":"0","denom":"ujuno"}],"gas":"0"},"memo":"","#,
            r#""msgs":[{"type":"sign/MsgSignData","value":{"#,
            r#""data":"{\n  \"auth\": {\n    \"nonce\": 0\n  }\n}","signer":"juno1signer"}}],"#,
            r#""sequence":"0"}"#,
        );
        assert_eq!(doc, expected);
    }

    #[test]
    fn payload_field_order_is_preserved() {
        // preserve_order keeps wire order; "zeta" stays before "alpha".
        let data: Value = serde_json::from_str(r#"{"zeta":1,"alpha":2}"#).unwrap();
        let doc = serialize_sign_doc("sign/MsgSignData", "s", &data, "c", "d");
        let zeta = doc.find("zeta").unwrap();
        let alpha = doc.find("alpha").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn html_characters_are_escaped() {
        let data = json!({ "note": "a<b & c>d" });
        let doc = serialize_sign_doc("sign/MsgSignData", "s", &data, "c", "d");
        assert!(doc.contains("\\u003c"));
        assert!(doc.contains("\\u0026"));
        assert!(doc.contains("\\u003e"));
        assert!(!doc.contains('<'));
        assert!(!doc.contains('&'));
        assert!(!doc.contains('>'));
    }
}
