//! RFC 3161 timestamps for CMS signatures.
//!
//! The request and response structures are small enough to be built and
//! walked by hand. Embedding the token into the signer info goes through
//! the `cms` types so the result stays valid DER.

use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::{ObjectIdentifier, SetOfVec};
use der::{Any, Decode, Encode};
use sha2::{Digest, Sha256};
use x509_cert::attr::Attribute;

use crate::error::{Error, Result};

/// SHA-256: 2.16.840.1.101.3.4.2.1
const OID_SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];

/// id-aa-timeStampToken
pub const ID_AA_TIME_STAMP_TOKEN: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");

/// DER TimeStampReq over the SHA-256 digest of `data`.
pub fn build_timestamp_request(data: &[u8]) -> Vec<u8> {
    let hash = Sha256::digest(data);
    let algorithm = build_sequence(&[&build_tlv(0x06, OID_SHA256), &[0x05u8, 0x00][..]]);
    let imprint = build_sequence(&[&algorithm, &build_tlv(0x04, &hash)]);

    build_sequence(&[
        &build_integer(&[1]),
        &imprint,
        &build_integer(&nonce()),
        // certReq
        &build_tlv(0x01, &[0xFF]),
    ])
}

/// The TimeStampToken of a granted DER TimeStampResp.
pub fn parse_timestamp_response(response: &[u8]) -> Result<Vec<u8>> {
    let fail = |msg: &str| Error::Timestamp(msg.to_string());

    if response.first() != Some(&0x30) {
        return Err(fail("response is not a SEQUENCE"));
    }
    let (content, _) = parse_tlv(response)?;
    if content.first() != Some(&0x30) {
        return Err(fail("missing PKIStatusInfo"));
    }
    let (status_info, token) = parse_tlv(content)?;
    if status_info.first() != Some(&0x02) {
        return Err(fail("missing PKIStatus"));
    }
    let (status, _) = parse_tlv(status_info)?;
    // granted (0) or grantedWithMods (1)
    match status {
        [0] | [1] => {}
        _ => {
            return Err(Error::Timestamp(format!(
                "request rejected with status {:?}",
                status
            )))
        }
    }
    if token.is_empty() {
        return Err(fail("no TimeStampToken in response"));
    }
    let (_, rest) = parse_tlv(token)?;
    Ok(token[..token.len() - rest.len()].to_vec())
}

/// Signature value of the first signer of a DER ContentInfo.
pub fn signature_value(cms_der: &[u8]) -> Result<Vec<u8>> {
    let signed_data = decode_signed_data(cms_der)?.1;
    signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .map(|signer| signer.signature.as_bytes().to_vec())
        .ok_or_else(|| Error::Signing("CMS has no signer".to_string()))
}

/// Add `token` as `id-aa-timeStampToken` unsigned attribute of the first signer.
pub fn add_timestamp_token(cms_der: &[u8], token: &[u8]) -> Result<Vec<u8>> {
    let (content_type, mut signed_data) = decode_signed_data(cms_der)?;

    let mut signers = signed_data.signer_infos.0.into_vec();
    let signer = signers
        .first_mut()
        .ok_or_else(|| Error::Signing("CMS has no signer".to_string()))?;

    let attribute = Attribute {
        oid: ID_AA_TIME_STAMP_TOKEN,
        values: SetOfVec::try_from(vec![Any::from_der(token)?])?,
    };
    let mut unsigned = signer
        .unsigned_attrs
        .take()
        .map(SetOfVec::into_vec)
        .unwrap_or_default();
    unsigned.push(attribute);
    signer.unsigned_attrs = Some(SetOfVec::try_from(unsigned)?);

    signed_data.signer_infos.0 = SetOfVec::try_from(signers)?;
    let content_info = ContentInfo {
        content_type,
        content: Any::encode_from(&signed_data)?,
    };
    Ok(content_info.to_der()?)
}

fn decode_signed_data(cms_der: &[u8]) -> Result<(ObjectIdentifier, SignedData)> {
    let content_info = ContentInfo::from_der(cms_der)?;
    let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;
    Ok((content_info.content_type, signed_data))
}

/// Fetches timestamp tokens from a TSA over HTTP.
#[derive(Debug, Clone)]
pub struct TsaClient {
    url: String,
}

impl TsaClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Timestamp token over the digest of `data`.
    #[cfg(feature = "timestamp")]
    pub fn timestamp(&self, data: &[u8]) -> Result<Vec<u8>> {
        let request = build_timestamp_request(data);
        log::debug!("Requesting timestamp from {}", self.url);
        let response = reqwest::blocking::Client::new()
            .post(&self.url)
            .header("Content-Type", "application/timestamp-query")
            .body(request)
            .send()?
            .error_for_status()?
            .bytes()?;
        parse_timestamp_response(&response)
    }

    #[cfg(not(feature = "timestamp"))]
    pub fn timestamp(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Timestamp(
            "built without the timestamp feature".to_string(),
        ))
    }

    /// Timestamp the signature value of `cms_der` and embed the token.
    pub fn add_timestamp(&self, cms_der: &[u8]) -> Result<Vec<u8>> {
        let signature = signature_value(cms_der)?;
        let token = self.timestamp(&signature)?;
        add_timestamp_token(cms_der, &token)
    }
}

fn nonce() -> Vec<u8> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    nanos.to_be_bytes().to_vec()
}

fn build_sequence(items: &[&[u8]]) -> Vec<u8> {
    let content: Vec<u8> = items.iter().flat_map(|i| i.iter().copied()).collect();
    build_tlv(0x30, &content)
}

fn build_integer(value: &[u8]) -> Vec<u8> {
    if value.first().map_or(false, |b| b & 0x80 != 0) {
        let mut padded = vec![0];
        padded.extend_from_slice(value);
        build_tlv(0x02, &padded)
    } else {
        build_tlv(0x02, value)
    }
}

fn build_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = (len as u32).to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (4 - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}

/// Split one TLV into its content and the bytes that follow it.
fn parse_tlv(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let short = || Error::Timestamp("truncated DER".to_string());
    let first = *data.get(1).ok_or_else(short)?;
    let (len, header) = if first < 0x80 {
        (first as usize, 2)
    } else {
        let count = (first & 0x7F) as usize;
        if count == 0 || count > 4 {
            return Err(Error::Timestamp("unsupported DER length".to_string()));
        }
        let bytes = data.get(2..2 + count).ok_or_else(short)?;
        let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, 2 + count)
    };
    let content = data.get(header..header + len).ok_or_else(short)?;
    Ok((content, &data[header + len..]))
}
