//! PKCS#12 keystore backed CMS signer.

use std::path::Path;

use openssl::pkcs12::Pkcs12;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::X509;

use super::SignatureInterface;
use crate::error::{Error, Result};

/// Signs with the key and certificate chain of a PKCS#12 keystore.
pub struct Pkcs12Signer {
    key: PKey<Private>,
    certificate: X509,
    chain: Vec<X509>,
}

impl Pkcs12Signer {
    /// Load a keystore file protected by `pin`.
    pub fn from_file<P: AsRef<Path>>(path: P, pin: &str) -> Result<Self> {
        let path = path.as_ref();
        let der = std::fs::read(path)
            .map_err(|e| Error::Keystore(format!("{}: {}", path.display(), e)))?;
        Self::from_der(&der, pin)
    }

    /// Load DER encoded keystore bytes protected by `pin`.
    pub fn from_der(der: &[u8], pin: &str) -> Result<Self> {
        let parsed = Pkcs12::from_der(der)
            .and_then(|p12| p12.parse2(pin))
            .map_err(|e| Error::Keystore(e.to_string()))?;

        let key = parsed
            .pkey
            .ok_or_else(|| Error::Keystore("keystore holds no private key".to_string()))?;
        let certificate = parsed
            .cert
            .ok_or_else(|| Error::Keystore("keystore holds no certificate".to_string()))?;
        let chain: Vec<X509> = parsed
            .ca
            .map(|stack| stack.into_iter().collect())
            .unwrap_or_default();

        log::debug!("Loaded keystore with {} chain certificates", chain.len());
        Ok(Self {
            key,
            certificate,
            chain,
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn chain(&self) -> &[X509] {
        &self.chain
    }
}

impl SignatureInterface for Pkcs12Signer {
    fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        let mut certs = Stack::new()?;
        for cert in &self.chain {
            certs.push(cert.clone())?;
        }
        let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY;
        let pkcs7 = Pkcs7::sign(&self.certificate, &self.key, &certs, content, flags)?;
        Ok(pkcs7.to_der()?)
    }
}
