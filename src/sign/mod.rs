//! Digital signatures with an optional visible appearance.
//!
//! [`VisibleSignature`] adds the signature field, reserves room for the CMS
//! container and fills it in using a [`SignatureInterface`]. The
//! [`Pkcs12Signer`] implementation signs with a PKCS#12 keystore.

mod designer;
mod keystore;
mod mdp;
mod placeholder;
mod tsa;
mod visible;

pub use designer::{
    SignatureOptions, VisibleSigProperties, VisibleSignDesigner, SIGNATURE_DEFAULT_LENGTH,
};
pub use keystore::Pkcs12Signer;
pub use mdp::{get_mdp_permission, set_mdp_permission};
pub use placeholder::{write_signature_at, ExternalSigningSupport};
pub use tsa::{
    add_timestamp_token, build_timestamp_request, parse_timestamp_response, signature_value,
    TsaClient, ID_AA_TIME_STAMP_TOKEN,
};
pub use visible::VisibleSignature;

use crate::error::Result;

/// Produces a DER encoded, detached CMS signature over some content.
pub trait SignatureInterface {
    fn sign(&self, content: &[u8]) -> Result<Vec<u8>>;
}

impl<T: SignatureInterface + ?Sized> SignatureInterface for &T {
    fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(content)
    }
}

impl<T: SignatureInterface + ?Sized> SignatureInterface for Box<T> {
    fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(content)
    }
}
