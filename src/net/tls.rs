//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::schema::TlsConfig;

/// True when both PEM files named by `tls` exist.
pub fn tls_files_present(tls: &TlsConfig) -> bool {
    Path::new(&tls.cert_path).is_file() && Path::new(&tls.key_path).is_file()
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, std::io::Error> {
    let cert_path = Path::new(&tls.cert_path);
    let key_path = Path::new(&tls.key_path);

    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing() -> TlsConfig {
        TlsConfig {
            cert_path: "/nonexistent/fullchain.pem".into(),
            key_path: "/nonexistent/privkey.pem".into(),
        }
    }

    #[test]
    fn absent_files_mean_plain_http() {
        assert!(!tls_files_present(&missing()));
    }

    #[tokio::test]
    async fn loading_absent_certificate_is_not_found() {
        let err = load_tls_config(&missing()).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
