//! DocMDP (certification) permissions.

use lopdf::{dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::document::{catalog_id, resolve, resolve_dict};
use crate::error::{Error, Result};

/// Access permission of the certification signature.
///
/// 0 when the document is not certified. A missing or out-of-range `/P`
/// counts as 2.
pub fn get_mdp_permission(doc: &LopdfDocument) -> u8 {
    let Ok(root) = catalog_id(doc) else { return 0 };
    let Ok(catalog) = doc.get_dictionary(root) else { return 0 };

    let doc_mdp = catalog
        .get(b"Perms")
        .ok()
        .and_then(|p| resolve_dict(doc, p))
        .and_then(|perms| perms.get(b"DocMDP").ok())
        .and_then(|d| resolve_dict(doc, d));
    let references = doc_mdp
        .and_then(|sig| sig.get(b"Reference").ok())
        .and_then(|r| resolve(doc, r))
        .and_then(|r| r.as_array().ok());

    for reference in references.into_iter().flatten() {
        let Some(reference) = resolve_dict(doc, reference) else { continue };
        let is_doc_mdp = reference
            .get(b"TransformMethod")
            .and_then(Object::as_name)
            .map_or(false, |m| m == b"DocMDP");
        if !is_doc_mdp {
            continue;
        }
        if let Some(params) = reference
            .get(b"TransformParams")
            .ok()
            .and_then(|p| resolve_dict(doc, p))
        {
            return match params.get(b"P").and_then(Object::as_i64) {
                Ok(p @ 1..=3) => p as u8,
                _ => 2,
            };
        }
    }
    0
}

/// Make `signature` a certification signature granting `permission`.
pub fn set_mdp_permission(
    doc: &mut LopdfDocument,
    signature: ObjectId,
    permission: u8,
) -> Result<()> {
    if !(1..=3).contains(&permission) {
        return Err(Error::Signing(format!("Invalid DocMDP permission {}", permission)));
    }
    let transform_params = dictionary! {
        "Type" => "TransformParams",
        "P" => i64::from(permission),
        "V" => "1.2",
    };
    let reference = dictionary! {
        "Type" => "SigRef",
        "TransformMethod" => "DocMDP",
        "DigestMethod" => "SHA1",
        "TransformParams" => transform_params,
    };
    doc.get_dictionary_mut(signature)?
        .set("Reference", Object::Array(vec![Object::Dictionary(reference)]));

    let root = catalog_id(doc)?;
    doc.get_dictionary_mut(root)?
        .set("Perms", dictionary! { "DocMDP" => signature });
    Ok(())
}
