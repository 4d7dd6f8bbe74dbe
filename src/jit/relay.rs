//! Private relay client
//!
//! Sends a signed raw transaction through `eth_sendPrivateTransaction`
//! so the JIT bundle never sits in the public mempool. Requests carry the
//! relay auth header: an EIP-191 signature over the keccak256 hex of the
//! request body.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use alloy::primitives::{keccak256, Bytes, TxHash};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::submitter::SubmitError;

pub const SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Clone)]
pub struct RelayClient {
    url: String,
    signer: PrivateKeySigner,
    client: reqwest::Client,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(url: impl Into<String>, signer: PrivateKeySigner, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            signer,
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// "address:0xsignature" for the auth header
    pub fn sign_body(&self, body: &[u8]) -> Result<String, SubmitError> {
        let message = keccak256(body).to_string();
        let signature = self
            .signer
            .sign_message_sync(message.as_bytes())
            .map_err(|e| SubmitError::Signing(e.to_string()))?;
        Ok(format!(
            "{}:{}",
            self.signer.address(),
            alloy::hex::encode_prefixed(signature.as_bytes())
        ))
    }

    pub fn private_tx_payload(raw: &Bytes) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendPrivateTransaction",
            "params": [{
                "tx": raw.to_string(),
                "preferences": { "fast": true }
            }]
        })
    }

    pub async fn send_private_transaction(&self, raw: &Bytes) -> Result<TxHash, SubmitError> {
        let body = serde_json::to_vec(&Self::private_tx_payload(raw))
            .map_err(|e| SubmitError::Relay(e.to_string()))?;
        let header = self.sign_body(&body)?;
        let header = HeaderValue::from_str(&header)
            .map_err(|e| SubmitError::Relay(format!("signature header invalid: {}", e)))?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, header)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(format!("relay POST failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;
        debug!(relay = %self.url, %status, body = %text, "Relay response");
        if !status.is_success() {
            return Err(SubmitError::Relay(format!("relay returned {}: {}", status, text)));
        }
        parse_response(&text)
    }
}

fn parse_response(text: &str) -> Result<TxHash, SubmitError> {
    let parsed: RpcResponse =
        serde_json::from_str(text).map_err(|e| SubmitError::Relay(format!("bad relay response: {}", e)))?;
    if let Some(err) = parsed.error {
        return Err(SubmitError::Relay(format!("{} (code {})", err.message, err.code)));
    }
    let result = parsed
        .result
        .ok_or_else(|| SubmitError::Relay("relay response has no result".to_string()))?;
    serde_json::from_value::<TxHash>(result).map_err(|e| SubmitError::Relay(format!("bad tx hash: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Signature;

    fn client() -> RelayClient {
        RelayClient::new(
            "https://relay.example",
            PrivateKeySigner::random(),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_signature_header_recovers_signer() {
        let relay = client();
        let body = br#"{"jsonrpc":"2.0"}"#;
        let header = relay.sign_body(body).unwrap();
        let (address, sig) = header.split_once(':').unwrap();
        assert_eq!(address, relay.signer.address().to_string());

        let bytes = alloy::hex::decode(sig).unwrap();
        let signature = Signature::from_raw(&bytes).unwrap();
        let recovered = signature
            .recover_address_from_msg(keccak256(body).to_string())
            .unwrap();
        assert_eq!(recovered, relay.signer.address());
    }

    #[test]
    fn test_private_tx_payload_shape() {
        let payload = RelayClient::private_tx_payload(&Bytes::from(vec![0x02, 0xf8]));
        assert_eq!(payload["method"], "eth_sendPrivateTransaction");
        assert_eq!(payload["params"][0]["tx"], "0x02f8");
        assert_eq!(payload["params"][0]["preferences"]["fast"], true);
    }

    #[test]
    fn test_parse_response() {
        let hash = TxHash::repeat_byte(0xab);
        let ok = format!(r#"{{"jsonrpc":"2.0","id":1,"result":"{}"}}"#, hash);
        assert_eq!(parse_response(&ok).unwrap(), hash);

        let err = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#;
        assert!(matches!(parse_response(err), Err(SubmitError::Relay(m)) if m.contains("nonce too low")));
        assert!(parse_response("not json").is_err());
    }
}
