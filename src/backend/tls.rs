//! Loading of TLS key material for the secured transports.

use crate::error::DirectoryError;
use rustls::{ClientConfig, RootCertStore};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Builds a TLS client configuration trusting the root certificates found
/// in the PEM file at `key_material`. Used for both the SSL and STARTTLS
/// transports when the endpoint supplies key material; without it the
/// protocol library falls back to the platform trust store.
pub(crate) fn client_config(key_material: &Path) -> Result<Arc<ClientConfig>, DirectoryError> {
    let pem = std::fs::read(key_material).map_err(|e| {
        DirectoryError::TlsFailed(format!(
            "cannot read key material {}: {e}",
            key_material.display()
        ))
    })?;

    let certs = rustls_pemfile::certs(&mut BufReader::new(&pem[..])).map_err(|e| {
        DirectoryError::TlsFailed(format!(
            "cannot parse key material {}: {e}",
            key_material.display()
        ))
    })?;

    let mut roots = RootCertStore::empty();
    roots.add_parsable_certificates(&certs);
    if roots.is_empty() {
        return Err(DirectoryError::TlsFailed(format!(
            "no usable certificates in {}",
            key_material.display()
        )));
    }

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_material_is_a_tls_failure() {
        let err = client_config(Path::new("/nonexistent/roots.pem")).unwrap_err();
        assert!(matches!(err, DirectoryError::TlsFailed(_)));
    }
}
