//! Trust Service binary.
//!
//! Prints this instance's public credential, then serves one request per
//! stdin line and answers with one JSON line on stdout:
//!
//! - `{"kid": ..., "publicKey": ...}` trusts a peer credential
//! - `rotate` replaces the signing identity
//! - `issue {"userName": ...}` issues a service token
//! - anything else is verified as a token
//!
//! Failures answer `{"error": <code>, "message": ...}`. Logs go to stderr.

use anyhow::Context;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use trust_service::{ClaimSet, Config, PublicCredential, TokenVerifier, TrustError, TrustService};

#[derive(Debug, PartialEq)]
enum Command {
    Register(PublicCredential),
    Rotate,
    Issue(ClaimSet),
    Verify(String),
    Invalid(String),
}

const COMMAND_INVALID: &str = "COMMAND_INVALID";

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line == "rotate" {
            return Some(Self::Rotate);
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        if word == "issue" {
            return Some(serde_json::from_str(rest).map_or_else(
                |e| Self::Invalid(format!("issue expects a JSON object of claims: {e}")),
                Self::Issue,
            ));
        }
        if let Ok(credential) = serde_json::from_str::<PublicCredential>(line) {
            return Some(Self::Register(credential));
        }
        Some(Self::Verify(line.to_string()))
    }
}

fn handle(service: &TrustService, command: Command) -> Value {
    let result = match command {
        Command::Register(credential) => service
            .add_public_credentials(&credential)
            .map(|stored| json!({ "registered": stored })),
        Command::Rotate => service
            .rotate_credentials()
            .map(|credential| json!({ "rotated": credential })),
        Command::Issue(claims) => service
            .issue_service_token(claims)
            .map(|token| json!({ "token": token.as_str() })),
        Command::Verify(token) => service
            .verify_token(&token)
            .map(|claims| json!({ "claims": claims })),
        Command::Invalid(message) => {
            return json!({ "error": COMMAND_INVALID, "message": message });
        }
    };

    result.unwrap_or_else(|e: TrustError| {
        json!({ "error": e.code(), "message": e.to_string() })
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    rust_common::init_tracing(&config.tracing()).context("failed to initialize tracing")?;

    info!(
        service = %config.service_name,
        algorithm = %config.key_algorithm,
        "Starting Trust Service"
    );

    let service = TrustService::new(&config).context("failed to create signing identity")?;
    println!("{}", serde_json::to_string(&service.public_credentials())?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(command) = Command::parse(&line) {
                    println!("{}", handle(&service, command));
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Failed to read stdin");
                return Err(e.into());
            }
        }
    }

    info!("Input closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("rotate"), Some(Command::Rotate));
        assert_eq!(
            Command::parse(r#"{"kid": "k1", "publicKey": "AAAA"}"#),
            Some(Command::Register(PublicCredential::new("k1", "AAAA")))
        );
        assert_eq!(
            Command::parse(r#"issue {"userName": "anna"}"#),
            Some(Command::Issue(ClaimSet::new().with("userName", "anna")))
        );
        assert_eq!(
            Command::parse("a.b.c"),
            Some(Command::Verify("a.b.c".to_string()))
        );
    }

    #[test]
    fn test_issue_with_bad_claims_is_a_command_error() {
        let service = TrustService::new(&Config::default()).unwrap();

        for line in ["issue", "issue {not json", "issue [1, 2]"] {
            let command = Command::parse(line).unwrap();
            assert!(matches!(command, Command::Invalid(_)), "{line}");
            assert_eq!(handle(&service, command)["error"], COMMAND_INVALID);
        }
    }

    #[test]
    fn test_handle_reports_typed_errors() {
        let service = TrustService::new(&Config::default()).unwrap();

        let reply = handle(&service, Command::Verify("garbage".to_string()));
        assert_eq!(reply["error"], "TOKEN_MALFORMED");

        let reply = handle(&service, Command::Issue(ClaimSet::new()));
        assert_eq!(reply["error"], "TOKEN_CLAIM_MISSING");
    }

    #[test]
    fn test_handle_issue_then_verify() {
        let service = TrustService::new(&Config::default()).unwrap();

        let reply = handle(
            &service,
            Command::Issue(ClaimSet::new().with("userName", "anna")),
        );
        let token = reply["token"].as_str().unwrap().to_string();

        let reply = handle(&service, Command::Verify(token));
        assert_eq!(reply["claims"]["userName"], "anna");
    }
}
