use dicom::core::value::Value;
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{DefaultDicomObject, InMemDicomObject, StandardDataDictionary};
use sha2::{Digest, Sha256};

/// Small helper trait to pull string values and pixel fingerprints from different DICOM object shapes.
pub trait ElementAccess {
    /// Text value of the element, without trailing padding. `None` when the element is absent.
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn has_element(&self, tag: Tag) -> bool;
    /// Hex SHA-256 over the raw Pixel Data bytes (or its encapsulated fragments).
    fn pixel_fingerprint(&self) -> Option<String>;
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches([' ', '\0']).to_string())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }

    fn pixel_fingerprint(&self) -> Option<String> {
        let elem = self.element(tags::PIXEL_DATA).ok()?;
        let mut hasher = Sha256::new();
        match elem.value() {
            Value::Primitive(p) => hasher.update(p.to_bytes()),
            Value::PixelSequence(seq) => {
                for fragment in seq.fragments() {
                    hasher.update(fragment);
                }
            }
            Value::Sequence(_) => return None,
        }
        Some(hex::encode(hasher.finalize()))
    }
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        (**self).element_str(tag)
    }

    fn has_element(&self, tag: Tag) -> bool {
        (**self).has_element(tag)
    }

    fn pixel_fingerprint(&self) -> Option<String> {
        (**self).pixel_fingerprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR};

    #[test]
    fn element_str_trims_padding() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(
            tags::PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from("Anonymous "),
        ));
        assert_eq!(obj.element_str(tags::PATIENT_NAME).as_deref(), Some("Anonymous"));
        assert_eq!(obj.element_str(tags::PATIENT_ID), None);
    }

    #[test]
    fn fingerprint_tracks_pixel_bytes() {
        let mut obj = InMemDicomObject::new_empty();
        assert_eq!(obj.pixel_fingerprint(), None);

        obj.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PrimitiveValue::from(vec![0_u8, 64, 128, 255]),
        ));
        let first = obj.pixel_fingerprint().expect("fingerprint");
        assert_eq!(first.len(), 64);

        obj.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PrimitiveValue::from(vec![0_u8, 64, 128, 254]),
        ));
        assert_ne!(obj.pixel_fingerprint().unwrap(), first);
    }
}
