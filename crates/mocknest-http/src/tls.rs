//! TLS material validation
//!
//! Certificates and keys named on the command line are loaded through
//! rustls at startup so misconfiguration fails fast. Termination itself is
//! expected to happen at a fronting proxy; the listener stays plain HTTP.

use mocknest_core::{Error, Result, TlsConfig};
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use tracing::info;

/// Load and check the configured certificate chain and private key.
/// Returns an error when either file is missing, unparsable or empty.
pub fn validate(config: &TlsConfig) -> Result<()> {
    info!(
        "validating TLS certificate {} and key {}",
        config.cert_file.display(),
        config.key_file.display()
    );

    let cert_file = File::open(&config.cert_file).map_err(|e| {
        Error::config(format!(
            "failed to open certificate file {}: {}",
            config.cert_file.display(),
            e
        ))
    })?;
    let mut cert_reader = BufReader::new(cert_file);
    let chain: Vec<_> = certs(&mut cert_reader).collect::<std::result::Result<_, _>>().map_err(|e| {
        Error::config(format!(
            "failed to parse certificate file {}: {}",
            config.cert_file.display(),
            e
        ))
    })?;
    if chain.is_empty() {
        return Err(Error::config(format!(
            "no certificates found in {}",
            config.cert_file.display()
        )));
    }

    let key_file = File::open(&config.key_file).map_err(|e| {
        Error::config(format!(
            "failed to open private key file {}: {}",
            config.key_file.display(),
            e
        ))
    })?;
    let mut key_reader = BufReader::new(key_file);
    let key = private_key(&mut key_reader)
        .map_err(|e| {
            Error::config(format!(
                "failed to parse private key file {}: {}",
                config.key_file.display(),
                e
            ))
        })?
        .ok_or_else(|| {
            Error::config(format!(
                "no private key found in {}",
                config.key_file.display()
            ))
        })?;

    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| Error::config(format!("certificate/key pair rejected: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_files_are_a_config_error() {
        let config = TlsConfig {
            cert_file: PathBuf::from("/nonexistent/cert.pem"),
            key_file: PathBuf::from("/nonexistent/key.pem"),
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn empty_cert_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "").unwrap();
        std::fs::write(&key, "").unwrap();

        let config = TlsConfig {
            cert_file: cert,
            key_file: key,
        };
        assert!(validate(&config).is_err());
    }
}
