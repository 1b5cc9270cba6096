use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use relay_core::{RelayError, StepContext};
use relay_plugin::capability::{KeyManager, SignValidator, Step};
use relay_plugin::step_factory::{missing_capability, ResolvedCapabilities, StepBuildOptions, StepFactory};

use super::sign::{blake2b512_b64, signing_string};

struct ParsedSignature {
    sub_id: String,
    key_id: String,
    created: i64,
    expires: i64,
    signature_b64: String,
}

fn extract_attr(value: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = value.find(&needle)? + needle.len();
    let rest = &value[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Parses a `Signature keyId="sub|key|ed25519",created="...",expires="...",signature="..."`
/// header value (§4.3 "Parsing the signature header").
fn parse_signature_header(value: &str) -> Result<ParsedSignature, RelayError> {
    let malformed = || RelayError::SignatureValidation("malformed sign header".to_string());

    let key_id_field = extract_attr(value, "keyId").ok_or_else(malformed)?;
    let segments: Vec<&str> = key_id_field.split('|').collect();
    if segments.len() < 3 {
        return Err(malformed());
    }
    let sub_id = segments[0].to_string();
    let key_id = segments[1].to_string();

    let created: i64 = extract_attr(value, "created")
        .ok_or_else(malformed)?
        .parse()
        .map_err(|_| malformed())?;
    let expires: i64 = extract_attr(value, "expires")
        .ok_or_else(malformed)?
        .parse()
        .map_err(|_| malformed())?;
    let signature_b64 = extract_attr(value, "signature").ok_or_else(malformed)?;

    Ok(ParsedSignature {
        sub_id,
        key_id,
        created,
        expires,
        signature_b64,
    })
}

/// Verifies the subscriber signature (mandatory) and, if present, the gateway
/// signature (optional) on an inbound request (§4.3 validateSign).
pub struct ValidateSignStep {
    validator: Arc<dyn SignValidator>,
    key_manager: Arc<dyn KeyManager>,
    enforce_expiry: bool,
}

impl ValidateSignStep {
    async fn verify_one(&self, ctx: &mut StepContext, header_value: Option<&str>, is_gateway: bool) -> Result<(), RelayError> {
        let challenge_header = if is_gateway { "Proxy-Authenticate" } else { "WWW-Authenticate" };
        let realm = ctx.sub_id.clone();
        let challenge = format!("Signature realm=\"{realm}\",headers=\"(created) (expires) digest\"");

        let Some(value) = header_value else {
            ctx.set_response_header(challenge_header, challenge);
            let header_name = if is_gateway { "X-Gateway-Authorization" } else { "Authorization" };
            return Err(RelayError::SignatureValidation(format!("missing {header_name} header")));
        };

        let parsed = match parse_signature_header(value) {
            Ok(p) => p,
            Err(e) => {
                ctx.set_response_header(challenge_header, challenge);
                return Err(e);
            }
        };

        if self.enforce_expiry && parsed.expires < Utc::now().timestamp() {
            ctx.set_response_header(challenge_header, challenge);
            return Err(RelayError::SignatureValidation("signature expired".into()));
        }

        let public_key = match self.key_manager.signing_public_key(&parsed.sub_id, &parsed.key_id).await {
            Ok(k) => k,
            Err(e) => {
                ctx.set_response_header(challenge_header, challenge);
                return Err(e);
            }
        };

        let digest_b64 = blake2b512_b64(&ctx.body);
        let expected_signing_string = signing_string(parsed.created, parsed.expires, &digest_b64);

        match self
            .validator
            .validate(expected_signing_string.as_bytes(), &parsed.signature_b64, &public_key)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                ctx.set_response_header(challenge_header, challenge);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Step for ValidateSignStep {
    fn name(&self) -> &str {
        "validateSign"
    }

    async fn run(&self, ctx: &mut StepContext) -> Result<(), RelayError> {
        let auth = ctx.header("Authorization").map(str::to_string);
        self.verify_one(ctx, auth.as_deref(), false).await?;

        let gateway_auth = ctx.header("X-Gateway-Authorization").map(str::to_string);
        if gateway_auth.is_some() {
            self.verify_one(ctx, gateway_auth.as_deref(), true).await?;
        }
        Ok(())
    }
}

pub struct ValidateSignStepFactory;

#[async_trait]
impl StepFactory for ValidateSignStepFactory {
    async fn build(&self, caps: &ResolvedCapabilities, opts: &StepBuildOptions) -> Result<Arc<dyn Step>, RelayError> {
        let validator = caps
            .sign_validator
            .clone()
            .ok_or_else(|| missing_capability("validateSign", "signValidator"))?;
        let key_manager = caps
            .key_manager
            .clone()
            .ok_or_else(|| missing_capability("validateSign", "keyManager"))?;
        Ok(Arc::new(ValidateSignStep {
            validator,
            key_manager,
            enforce_expiry: opts.enforce_signature_expiry,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_header() {
        let header = "Signature keyId=\"np-1|key-7|ed25519\",algorithm=\"ed25519\",created=\"1000\",expires=\"1300\",headers=\"(created) (expires) digest\",signature=\"c2ln\"";
        let parsed = parse_signature_header(header).unwrap();
        assert_eq!(parsed.sub_id, "np-1");
        assert_eq!(parsed.key_id, "key-7");
        assert_eq!(parsed.created, 1000);
        assert_eq!(parsed.expires, 1300);
        assert_eq!(parsed.signature_b64, "c2ln");
    }

    #[test]
    fn rejects_header_without_keyid() {
        assert!(parse_signature_header("Signature algorithm=\"ed25519\"").is_err());
    }

    #[test]
    fn rejects_keyid_with_too_few_segments() {
        let header = "Signature keyId=\"np-1|key-7\",created=\"1\",expires=\"2\",signature=\"x\"";
        assert!(parse_signature_header(header).is_err());
    }
}
