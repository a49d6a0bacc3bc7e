//! Uniqueness index
//!
//! Unique fields (and structures declared with `unique_instances`) register
//! a fingerprint of their value per structure name. The index is an explicit
//! shared resource: callers create one, hand it to construction or
//! deserialization through the options, and may `reset` it.
//!
//! Only top-level records are registered; instances nested inside other
//! values and copies made with `Clone`/`deep_copy` are not.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use typeshape_core_types::{FieldPath, Sensitive};

use crate::errors::{Result, SchemaError};
use crate::model::Instance;
use crate::value::Value;

/// Slot name used for whole-instance claims
const INSTANCE_SLOT: &str = "*";

/// Hasher that feeds every written byte into SHA-256
struct DigestHasher(Sha256);

impl Hasher for DigestHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        let digest = self.0.clone().finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head)
    }
}

/// Hex SHA-256 of a value's field-wise content
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> String {
    let mut hasher = DigestHasher(Sha256::new());
    value.hash(&mut hasher);
    hex::encode(hasher.0.finalize())
}

/// One registration in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    structure: String,
    slot: String,
    fingerprint: String,
    path: FieldPath,
    shown: String,
}

impl Claim {
    /// Claim for a unique field value
    pub fn field(structure: &str, field: &str, value: &Value, redact: bool) -> Self {
        Self {
            structure: structure.to_string(),
            slot: field.to_string(),
            fingerprint: fingerprint(value),
            path: FieldPath::field(field),
            shown: Sensitive::render(value, redact),
        }
    }

    /// Claim for a whole instance
    pub fn instance(instance: &Instance) -> Self {
        Self {
            structure: instance.name().to_string(),
            slot: INSTANCE_SLOT.to_string(),
            fingerprint: instance.fingerprint(),
            path: FieldPath::root(),
            shown: instance.to_string(),
        }
    }

    fn key(&self) -> (String, String) {
        (self.structure.clone(), self.slot.clone())
    }
}

/// Every claim a freshly constructed instance makes
pub(crate) fn claims_for(instance: &Instance) -> Vec<Claim> {
    let ty = instance.structure();
    let mut claims: Vec<Claim> = ty
        .fields()
        .iter()
        .filter(|(_, field)| field.is_unique())
        .filter_map(|(name, field)| {
            instance
                .get(name)
                .filter(|v| !v.is_undefined())
                .map(|v| Claim::field(ty.name(), name, v, field.is_sensitive()))
        })
        .collect();
    if ty.unique_instances() {
        claims.push(Claim::instance(instance));
    }
    claims
}

/// Registry of claimed values keyed by (structure, field)
#[derive(Debug, Default)]
pub struct UniquenessIndex {
    seen: Mutex<HashMap<(String, String), HashSet<String>>>,
}

impl UniquenessIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// New index ready to share between options
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), HashSet<String>>> {
        // a panic while holding the lock cannot leave the map half-written
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register one value
    ///
    /// # Errors
    ///
    /// `UniquenessViolation` if the value is already registered.
    pub fn claim(&self, claim: &Claim) -> Result<()> {
        self.claim_all(std::slice::from_ref(claim))
    }

    /// Register several values atomically: all of them or none
    ///
    /// # Errors
    ///
    /// `UniquenessViolation` for the first value already registered (or
    /// repeated within `claims`).
    pub fn claim_all(&self, claims: &[Claim]) -> Result<()> {
        if claims.is_empty() {
            return Ok(());
        }
        let mut seen = self.lock();
        let mut pending: HashSet<(String, String, String)> = HashSet::new();
        for claim in claims {
            let taken = seen
                .get(&claim.key())
                .is_some_and(|fingerprints| fingerprints.contains(&claim.fingerprint));
            let repeated =
                !pending.insert((claim.structure.clone(), claim.slot.clone(), claim.fingerprint.clone()));
            if taken || repeated {
                tracing::debug!(
                    structure = %claim.structure,
                    path = %claim.path,
                    "uniqueness claim rejected"
                );
                return Err(SchemaError::UniquenessViolation {
                    path: claim.path.clone(),
                    found: claim.shown.clone(),
                });
            }
        }
        for claim in claims {
            seen.entry(claim.key())
                .or_default()
                .insert(claim.fingerprint.clone());
        }
        Ok(())
    }

    /// Forget a registered value
    pub fn release(&self, claim: &Claim) {
        let mut seen = self.lock();
        if let Some(fingerprints) = seen.get_mut(&claim.key()) {
            fingerprints.remove(&claim.fingerprint);
        }
    }

    pub fn contains(&self, claim: &Claim) -> bool {
        self.lock()
            .get(&claim.key())
            .is_some_and(|fingerprints| fingerprints.contains(&claim.fingerprint))
    }

    /// Number of registered values across all structures
    pub fn len(&self) -> usize {
        self.lock().values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    #[test]
    fn test_fingerprint_is_stable_and_distinguishes() {
        assert_eq!(fingerprint(&Value::Int(1)), fingerprint(&Value::Int(1)));
        assert_ne!(fingerprint(&Value::Int(1)), fingerprint(&Value::Float(1.0)));
        assert_eq!(fingerprint(&Value::Int(1)).len(), 64);
    }

    #[test]
    fn test_claim_scoped_by_structure() {
        let index = UniquenessIndex::new();
        let ssid = Value::from("123");
        index.claim(&Claim::field("Person", "ssid", &ssid, false)).unwrap();
        let err = index
            .claim(&Claim::field("Person", "ssid", &ssid, false))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::UniquenessViolation);
        index.claim(&Claim::field("Pet", "ssid", &ssid, false)).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_claim_all_is_atomic() {
        let index = UniquenessIndex::new();
        index
            .claim(&Claim::field("P", "b", &Value::Int(2), false))
            .unwrap();
        let claims = vec![
            Claim::field("P", "a", &Value::Int(1), false),
            Claim::field("P", "b", &Value::Int(2), false),
        ];
        assert!(index.claim_all(&claims).is_err());
        assert!(!index.contains(&claims[0]));
    }

    #[test]
    fn test_release_and_reset() {
        let index = UniquenessIndex::new();
        let claim = Claim::field("P", "a", &Value::Int(1), false);
        index.claim(&claim).unwrap();
        index.release(&claim);
        assert!(index.claim(&claim).is_ok());
        index.reset();
        assert!(index.is_empty());
    }

    #[test]
    fn test_sensitive_claims_are_redacted() {
        let index = UniquenessIndex::new();
        let claim = Claim::field("P", "secret", &Value::from("s3cret"), true);
        index.claim(&claim).unwrap();
        let err = index.claim(&claim).unwrap_err();
        assert!(!err.to_string().contains("s3cret"));
    }
}
