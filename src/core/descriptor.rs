use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::common::error::{EnrollError, Result};

/// Face feature vector produced by the analyzer. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the vector is non-empty and holds only finite values.
    pub fn is_usable(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|v| v.is_finite())
    }
}

/// Encode a descriptor for transport. Round-trips through [`deserialize`].
pub fn serialize(descriptor: &Descriptor) -> Result<String> {
    if !descriptor.is_usable() {
        return Err(EnrollError::Serialization(
            "descriptor is empty or contains non-finite values".into()
        ));
    }
    serde_json::to_string(descriptor)
        .map_err(|e| EnrollError::Serialization(format!("Failed to encode descriptor: {}", e)))
}

pub fn deserialize(encoded: &str) -> Result<Descriptor> {
    let descriptor: Descriptor = serde_json::from_str(encoded)
        .map_err(|e| EnrollError::Serialization(format!("Failed to decode descriptor: {}", e)))?;
    if !descriptor.is_usable() {
        return Err(EnrollError::Serialization("decoded descriptor is empty".into()));
    }
    Ok(descriptor)
}

/// Hex SHA-256 of an encoded descriptor, safe to log or upload.
pub fn digest(encoded: &str) -> String {
    let hash = Sha256::digest(encoded.as_bytes());
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_awkward_floats() {
        let original = Descriptor::new(vec![0.1, -0.333_333_34, 1.0e-7, 42.5, -0.0078125]);
        let encoded = serialize(&original).unwrap();
        assert_eq!(deserialize(&encoded).unwrap(), original);
    }

    #[test]
    fn rejects_unusable_vectors() {
        assert!(serialize(&Descriptor::new(vec![])).is_err());
        assert!(serialize(&Descriptor::new(vec![1.0, f32::NAN])).is_err());
        assert!(deserialize("[]").is_err());
        assert!(deserialize("not json").is_err());
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = digest("[0.5]");
        assert_eq!(d.len(), 64);
        assert_eq!(d, digest("[0.5]"));
        assert_ne!(d, digest("[0.25]"));
    }
}
