//! The guest artifact embedded in the binary.
//!
//! Stored as WAT text; Wasmtime compiles it when the [`Bridge`](crate::Bridge)
//! is built.

/// URL-building guest: prefixes `http://` unless the input already has a scheme.
pub const BUILD_URL_WAT: &str = include_str!("../guest/build_url.wat");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_declares_contract() {
        for needle in [
            r#"(import "env" "log""#,
            r#"(export "_initialize")"#,
            r#"(export "malloc")"#,
            r#"(export "free")"#,
            r#"(export "message")"#,
            r#"(export "formatting")"#,
        ] {
            assert!(BUILD_URL_WAT.contains(needle), "artifact missing {}", needle);
        }
    }
}
