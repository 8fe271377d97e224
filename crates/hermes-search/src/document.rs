//! Stored document records of the description index.

use hermes_types::{ComponentError, SctId};

/// The stored fields of one description document.
///
/// Everything needed to materialise a search hit without going back to the
/// component store; filters and refset memberships live in the posting
/// lists, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// The description this document indexes.
    pub description_id: SctId,
    /// The concept the description names.
    pub concept_id: SctId,
    /// The term, verbatim.
    pub term: String,
    /// Description type identifier.
    pub type_id: SctId,
    /// Whether the description row is active.
    pub active_description: bool,
    /// Whether the parent concept is active.
    pub active_concept: bool,
}

impl DocumentRecord {
    /// Encodes the stored fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(26 + self.term.len());
        buf.extend_from_slice(&self.description_id.to_be_bytes());
        buf.extend_from_slice(&self.concept_id.to_be_bytes());
        buf.extend_from_slice(&self.type_id.to_be_bytes());
        buf.push(u8::from(self.active_description));
        buf.push(u8::from(self.active_concept));
        buf.extend_from_slice(self.term.as_bytes());
        buf
    }

    /// Decodes stored fields written by [`DocumentRecord::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ComponentError> {
        if bytes.len() < 26 {
            return Err(ComponentError::Truncated(bytes.len()));
        }
        let description_id = SctId::from_be_bytes(bytes[0..8].try_into().expect("8 bytes"));
        let concept_id = SctId::from_be_bytes(bytes[8..16].try_into().expect("8 bytes"));
        let type_id = SctId::from_be_bytes(bytes[16..24].try_into().expect("8 bytes"));
        let active_description = bytes[24] != 0;
        let active_concept = bytes[25] != 0;
        let term = std::str::from_utf8(&bytes[26..])
            .map_err(|_| ComponentError::InvalidUtf8(26))?
            .to_string();
        Ok(Self {
            description_id,
            concept_id,
            term,
            type_id,
            active_description,
            active_concept,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trip() {
        let record = DocumentRecord {
            description_id: 754786011,
            concept_id: 73211009,
            term: "Diabetes mellitus (disorder)".to_string(),
            type_id: 900000000000003001,
            active_description: true,
            active_concept: false,
        };
        assert_eq!(DocumentRecord::decode(&record.encode()).unwrap(), record);
    }

    #[test]
    fn test_record_truncated() {
        assert!(DocumentRecord::decode(&[0u8; 10]).is_err());
    }
}
