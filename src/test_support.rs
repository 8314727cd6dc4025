use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Builds an unsigned three-segment token carrying the given `exp`.
pub(crate) fn mint_token(exp: i64) -> String {
    mint_token_with(exp, "test")
}

/// Like [`mint_token`], with a subject so tokens with equal expiry differ.
pub(crate) fn mint_token_with(exp: i64, sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp, "sub": sub }).to_string());
    format!("{header}.{payload}.signature")
}
