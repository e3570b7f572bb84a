//! Interactive forms: AcroForm fields and XFA data.

mod acroform;
mod xfa;

pub use acroform::{
    acro_form, clear_need_appearances, field_by_name, fields, need_appearances, FormField,
};
pub(crate) use acroform::ensure_acro_form;
pub use xfa::{get_parsable_xfa_form, get_xfa, XfaPacket, XfaResource};
