//! Adding a (visible) signature to a document.

use std::path::Path;

use chrono::Utc;
use lopdf::{dictionary, Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::designer::{SignatureOptions, VisibleSigProperties, VisibleSignDesigner};
use super::mdp::{get_mdp_permission, set_mdp_permission};
use super::placeholder::{write_signature_at, ExternalSigningSupport};
use super::tsa::TsaClient;
use super::SignatureInterface;
use crate::document::{resolve, PdfDocument};
use crate::error::{Error, Result};
use crate::form::{
    clear_need_appearances, ensure_acro_form, field_by_name, fields, need_appearances,
};
use crate::model::Rectangle;

/// Widget flags: print and locked.
const WIDGET_FLAGS: i64 = 132;
/// SignaturesExist and AppendOnly.
const SIG_FLAGS: i64 = 3;

/// Signs documents with a [`SignatureInterface`], optionally showing an image.
pub struct VisibleSignature<S: SignatureInterface> {
    signer: S,
    designer: Option<VisibleSignDesigner>,
    properties: VisibleSigProperties,
    external_signing: bool,
    late_external_signing: bool,
    tsa: Option<TsaClient>,
}

impl<S: SignatureInterface> VisibleSignature<S> {
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            designer: None,
            properties: VisibleSigProperties::default(),
            external_signing: false,
            late_external_signing: false,
            tsa: None,
        }
    }

    /// Designer used by the next
    /// [`set_visible_signature_properties`](Self::set_visible_signature_properties).
    pub fn set_visible_sign_designer(&mut self, designer: VisibleSignDesigner) {
        self.designer = Some(designer);
    }

    /// Signer details for a new field on the 1-based `page`.
    pub fn set_visible_signature_properties(
        &mut self,
        name: &str,
        location: &str,
        reason: &str,
        preferred_size: usize,
        page: u32,
        visual_sign_enabled: bool,
    ) {
        self.properties = VisibleSigProperties::new()
            .signer_name(name)
            .signer_location(location)
            .signature_reason(reason)
            .preferred_size(preferred_size)
            .page(page)
            .visual_sign_enabled(visual_sign_enabled)
            .designer(self.designer.clone());
    }

    pub fn set_properties(&mut self, properties: VisibleSigProperties) {
        self.properties = properties;
    }

    pub fn properties(&self) -> &VisibleSigProperties {
        &self.properties
    }

    /// Sign the prepared content in a separate step instead of inline.
    pub fn set_external_signing(&mut self, external: bool) {
        self.external_signing = external;
    }

    pub fn is_external_signing(&self) -> bool {
        self.external_signing
    }

    /// With external signing, save first and patch the signature into the file.
    pub fn set_late_external_signing(&mut self, late: bool) {
        self.late_external_signing = late;
    }

    pub fn is_late_external_signing(&self) -> bool {
        self.late_external_signing
    }

    pub fn set_tsa_url(&mut self, url: Option<&str>) {
        self.tsa = url.map(TsaClient::new);
    }

    /// CMS signature of `content`, timestamped when a TSA is set.
    pub fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        let cms = self.signer.sign(content)?;
        match &self.tsa {
            Some(tsa) => tsa.add_timestamp(&cms),
            None => Ok(cms),
        }
    }

    /// Sign `input` into `output`.
    ///
    /// `signature_field_name` selects an existing, unsigned signature field.
    pub fn sign_pdf<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input: P,
        output: Q,
        tsa_url: Option<&str>,
        signature_field_name: Option<&str>,
    ) -> Result<()> {
        let input = input.as_ref();
        let output = output.as_ref();
        if !input.exists() {
            return Err(Error::DocumentNotFound(input.to_path_buf()));
        }
        self.set_tsa_url(tsa_url);

        let mut doc = PdfDocument::open(input)?;
        let mut support = self.prepare(&mut doc, signature_field_name)?;

        if !self.external_signing {
            let cms = self.sign(&support.content())?;
            support.set_signature(&cms)?;
            std::fs::write(output, support.bytes())?;
            return Ok(());
        }

        log::info!("Signing externally {}", output.display());
        let cms = self.sign(&support.content())?;
        if self.late_external_signing {
            support.check_fits(&cms)?;
            support.set_signature(&[])?;
            std::fs::write(output, support.bytes())?;
            write_signature_at(output, support.signature_offset() as u64, &cms)?;
        } else {
            support.set_signature(&cms)?;
            std::fs::write(output, support.bytes())?;
        }
        Ok(())
    }

    /// Sign an already loaded document and return the signed bytes.
    pub fn sign_document(&self, doc: &mut PdfDocument) -> Result<Vec<u8>> {
        let mut support = self.prepare(doc, None)?;
        let cms = self.sign(&support.content())?;
        support.set_signature(&cms)?;
        Ok(support.into_bytes())
    }

    /// Add the signature structures and serialise with a placeholder.
    pub fn prepare(
        &self,
        doc: &mut PdfDocument,
        signature_field_name: Option<&str>,
    ) -> Result<ExternalSigningSupport> {
        let permission = get_mdp_permission(doc.inner());
        if permission == 1 {
            return Err(Error::ModificationNotPermitted);
        }
        let version = doc.version();
        let properties = &self.properties;
        let options = properties.signature_options();
        let lopdf = doc.inner_mut();

        let existing = match signature_field_name {
            Some(name) => find_existing_signature(lopdf, name)?,
            None => None,
        };
        let signature = match existing {
            Some((_, signature)) => signature,
            None => lopdf.add_object(dictionary! { "Type" => "Sig" }),
        };

        if version >= 1.5 && permission == 0 {
            set_mdp_permission(lopdf, signature, 2)?;
        }

        if need_appearances(lopdf) {
            if fields(lopdf).is_empty() {
                clear_need_appearances(lopdf)?;
            } else {
                log::warn!("/NeedAppearances is set, signature may be ignored by Adobe Reader");
            }
        }

        let sig = lopdf.get_dictionary_mut(signature)?;
        sig.set("Filter", "Adobe.PPKLite");
        sig.set("SubFilter", "adbe.pkcs7.detached");
        sig.set("Name", Object::string_literal(properties.get_signer_name()));
        sig.set("Location", Object::string_literal(properties.get_signer_location()));
        sig.set("Reason", Object::string_literal(properties.get_signature_reason()));
        sig.set(
            "M",
            Object::string_literal(Utc::now().format("D:%Y%m%d%H%M%S+00'00'").to_string()),
        );

        let designer = properties
            .get_designer()
            .filter(|_| properties.is_visual_sign_enabled());
        match existing {
            Some((field, _)) => {
                if let Some(designer) = designer {
                    let appearance = designer.build_appearance(lopdf)?;
                    lopdf
                        .get_dictionary_mut(field)?
                        .set("AP", dictionary! { "N" => appearance });
                }
                mark_signatures_exist(lopdf)?;
            }
            None => add_signature_field(lopdf, signature, designer, &options)?,
        }

        ExternalSigningSupport::prepare(lopdf, signature, options.preferred_signature_size())
    }
}

/// Signature field `name` and a fresh signature dictionary set as its value.
fn find_existing_signature(
    doc: &mut LopdfDocument,
    name: &str,
) -> Result<Option<(ObjectId, ObjectId)>> {
    let Some(field) = field_by_name(doc, name) else {
        return Ok(None);
    };
    if field.has_value {
        return Err(Error::AlreadySigned(name.to_string()));
    }
    let signature = doc.add_object(dictionary! { "Type" => "Sig" });
    doc.get_dictionary_mut(field.id)?.set("V", signature);
    Ok(Some((field.id, signature)))
}

fn mark_signatures_exist(doc: &mut LopdfDocument) -> Result<ObjectId> {
    let form = ensure_acro_form(doc)?;
    doc.get_dictionary_mut(form)?.set("SigFlags", SIG_FLAGS);
    Ok(form)
}

/// Resolved copy of an array entry that may be a reference.
fn array_entry(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> Vec<Object> {
    dict.get(key)
        .ok()
        .and_then(|v| resolve(doc, v))
        .and_then(|v| v.as_array().ok())
        .cloned()
        .unwrap_or_default()
}

fn unique_field_name(doc: &LopdfDocument) -> String {
    let existing: Vec<String> = fields(doc).into_iter().map(|f| f.name).collect();
    (1..)
        .map(|n| format!("Signature{}", n))
        .find(|name| !existing.contains(name))
        .unwrap_or_else(|| "Signature".to_string())
}

/// Create a signature field whose widget sits on the configured page.
fn add_signature_field(
    doc: &mut LopdfDocument,
    signature: ObjectId,
    designer: Option<&VisibleSignDesigner>,
    options: &SignatureOptions,
) -> Result<()> {
    let pages = doc.get_pages();
    // invisible signatures go to the first page
    let page_number = if designer.is_some() { options.page() } else { 1 };
    let page_id = *pages
        .get(&page_number)
        .ok_or(Error::PageOutOfRange(page_number, pages.len() as u32))?;

    let (rect, appearance) = match designer {
        Some(designer) => (designer.rectangle(), Some(designer.build_appearance(doc)?)),
        None => (Rectangle::from_corners(0.0, 0.0, 0.0, 0.0), None),
    };

    let mut widget = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Sig",
        "T" => Object::string_literal(unique_field_name(doc)),
        "V" => signature,
        "F" => WIDGET_FLAGS,
        "P" => page_id,
        "Rect" => rect.to_array(),
    };
    if let Some(appearance) = appearance {
        widget.set("AP", dictionary! { "N" => appearance });
    }
    let widget = doc.add_object(widget);

    let form = mark_signatures_exist(doc)?;
    let mut form_fields = array_entry(doc, doc.get_dictionary(form)?, b"Fields");
    form_fields.push(widget.into());
    doc.get_dictionary_mut(form)?.set("Fields", form_fields);

    let annots_ref = doc
        .get_dictionary(page_id)?
        .get(b"Annots")
        .and_then(Object::as_reference)
        .ok();
    match annots_ref {
        Some(annots_id) => {
            if let Ok(Object::Array(annots)) = doc.get_object_mut(annots_id) {
                annots.push(widget.into());
            }
        }
        None => {
            let mut annots = array_entry(doc, doc.get_dictionary(page_id)?, b"Annots");
            annots.push(widget.into());
            doc.get_dictionary_mut(page_id)?.set("Annots", annots);
        }
    }
    log::debug!("Added signature widget {:?} on page {}", widget, page_number);
    Ok(())
}
