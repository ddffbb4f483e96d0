//! Listener transport selection: HTTPS when certificate material is usable,
//! plaintext on the same port otherwise.
//!
//! [`resolve_transport`] only decides; it never logs. The caller reports the
//! returned diagnostics.

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;

#[derive(Clone, PartialEq, Eq)]
pub enum TransportMode {
    Plaintext,
    Encrypted { cert_pem: Vec<u8>, key_pem: Vec<u8> },
}

impl TransportMode {
    pub fn scheme(&self) -> &'static str {
        match self {
            TransportMode::Plaintext => "http",
            TransportMode::Encrypted { .. } => "https",
        }
    }
}

// Keep key material out of logs.
impl fmt::Debug for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Plaintext => f.write_str("Plaintext"),
            TransportMode::Encrypted { .. } => f.write_str("Encrypted"),
        }
    }
}

#[derive(Debug)]
pub struct TransportResolution {
    pub mode: TransportMode,
    /// Advisory messages, e.g. why HTTPS was not used.
    pub diagnostics: Vec<String>,
}

pub fn resolve_transport(use_https: bool, cert_path: &Path, key_path: &Path) -> TransportResolution {
    if !use_https {
        return TransportResolution {
            mode: TransportMode::Plaintext,
            diagnostics: Vec::new(),
        };
    }

    let mut diagnostics = Vec::new();
    let cert_pem = read_pem(cert_path, "certificate", &mut diagnostics);
    let key_pem = read_pem(key_path, "private key", &mut diagnostics);

    match (cert_pem, key_pem) {
        (Some(cert_pem), Some(key_pem)) => TransportResolution {
            mode: TransportMode::Encrypted { cert_pem, key_pem },
            diagnostics,
        },
        _ => {
            diagnostics.push("HTTPS requested but TLS material is unavailable; serving plain HTTP".to_string());
            TransportResolution {
                mode: TransportMode::Plaintext,
                diagnostics,
            }
        }
    }
}

fn read_pem(path: &Path, what: &str, diagnostics: &mut Vec<String>) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => {
            diagnostics.push(format!("TLS {} file {} is empty", what, path.display()));
            None
        }
        Ok(bytes) => Some(bytes),
        Err(e) => {
            diagnostics.push(format!(
                "TLS {} file {} is not readable: {}",
                what,
                path.display(),
                e
            ));
            None
        }
    }
}

/// Parse the PEM material of an encrypted mode. `None` means serve plaintext,
/// either because none was configured or because it failed to parse.
pub async fn tls_config_or_fallback(mode: TransportMode) -> Option<RustlsConfig> {
    let TransportMode::Encrypted { cert_pem, key_pem } = mode else {
        return None;
    };

    match RustlsConfig::from_pem(cert_pem, key_pem).await {
        Ok(tls) => Some(tls),
        Err(e) => {
            tracing::warn!(error = %e, "Invalid TLS material; serving plain HTTP");
            None
        }
    }
}

/// Bind `addr` and serve `app` until the server future ends.
pub async fn serve(addr: SocketAddr, app: Router, mode: TransportMode) -> anyhow::Result<()> {
    if let Some(tls) = tls_config_or_fallback(mode).await {
        tracing::info!(address = %addr, scheme = "https", "Server listening");
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await?;
        return Ok(());
    }

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, scheme = "http", "Server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_plaintext_when_https_not_requested() {
        let resolution = resolve_transport(false, Path::new("/missing/cert"), Path::new("/missing/key"));
        assert_eq!(resolution.mode, TransportMode::Plaintext);
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_material_falls_back_with_diagnostics() {
        let cert = pem_file("-----BEGIN CERTIFICATE-----\n");
        let resolution = resolve_transport(true, cert.path(), Path::new("/definitely/missing/key.pem"));

        assert_eq!(resolution.mode, TransportMode::Plaintext);
        assert_eq!(resolution.mode.scheme(), "http");
        assert!(resolution.diagnostics.iter().any(|d| d.contains("private key")));
        assert!(resolution.diagnostics.iter().any(|d| d.contains("plain HTTP")));
    }

    #[test]
    fn test_empty_file_is_unusable() {
        let cert = pem_file("");
        let key = pem_file("key");
        let resolution = resolve_transport(true, cert.path(), key.path());
        assert_eq!(resolution.mode, TransportMode::Plaintext);
        assert!(resolution.diagnostics.iter().any(|d| d.contains("empty")));
    }

    #[test]
    fn test_readable_material_selects_encrypted() {
        let cert = pem_file("cert-bytes");
        let key = pem_file("key-bytes");
        let resolution = resolve_transport(true, cert.path(), key.path());

        assert_eq!(
            resolution.mode,
            TransportMode::Encrypted {
                cert_pem: b"cert-bytes".to_vec(),
                key_pem: b"key-bytes".to_vec(),
            }
        );
        assert_eq!(resolution.mode.scheme(), "https");
        assert!(resolution.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_pem_falls_back_to_plaintext() {
        let mode = TransportMode::Encrypted {
            cert_pem: b"-----BEGIN CERTIFICATE-----\nnot base64\n-----END CERTIFICATE-----\n".to_vec(),
            key_pem: b"garbage".to_vec(),
        };
        assert!(tls_config_or_fallback(mode).await.is_none());
    }

    #[tokio::test]
    async fn test_plaintext_mode_has_no_tls_config() {
        assert!(tls_config_or_fallback(TransportMode::Plaintext).await.is_none());
    }
}
