//! SNOMED CT identifier structure and Verhoeff verification.
//!
//! Every SCTID embeds a two-digit partition (digits −3 and −2) naming the
//! component type, and a final Verhoeff check digit computed over the whole
//! identifier. Identifiers from extension namespaces use the long-form
//! partitions `10`, `11` and `12`.

use crate::error::ComponentError;
use crate::SctId;

/// Component type encoded in an identifier's partition digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Partition {
    /// Partition `00` or `10`.
    Concept,
    /// Partition `01` or `11`.
    Description,
    /// Partition `02` or `12`.
    Relationship,
}

/// Verhoeff multiplication table (dihedral group D5).
const D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

/// Verhoeff permutation table.
const P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

/// Verhoeff inverse table.
const INV: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

/// Decodes the partition digits of an identifier.
///
/// Returns `None` when the digits do not name a component type.
pub fn partition(id: SctId) -> Option<Partition> {
    match partition_digits(id) {
        0 | 10 => Some(Partition::Concept),
        1 | 11 => Some(Partition::Description),
        2 | 12 => Some(Partition::Relationship),
        _ => None,
    }
}

/// The raw partition digits: `(id / 10) mod 100`.
pub fn partition_digits(id: SctId) -> u8 {
    ((id / 10).rem_euclid(100)) as u8
}

/// Computes the Verhoeff checksum over all digits, check digit included.
///
/// A well-formed identifier yields zero.
pub fn check(id: SctId) -> u8 {
    let mut c = 0u8;
    let mut n = id;
    let mut i = 0usize;
    // Digits are consumed least-significant first, which is the reversed
    // order the Verhoeff scheme expects.
    loop {
        let digit = (n % 10) as usize;
        c = D[c as usize][P[i % 8][digit] as usize];
        n /= 10;
        i += 1;
        if n == 0 {
            break;
        }
    }
    c
}

/// True iff the identifier is positive, carries a recognised partition and
/// its check digit verifies.
pub fn is_valid(id: SctId) -> bool {
    id > 0 && partition(id).is_some() && check(id) == 0
}

/// Validates an identifier, optionally requiring a specific partition.
pub fn validate(id: SctId, expected: Option<Partition>) -> Result<(), ComponentError> {
    if id <= 0 {
        return Err(ComponentError::NotPositive(id));
    }
    match partition(id) {
        None => {
            return Err(ComponentError::InvalidPartition {
                id,
                partition: partition_digits(id),
            })
        }
        Some(p) => {
            if let Some(expected) = expected {
                if p != expected {
                    return Err(ComponentError::InvalidPartition {
                        id,
                        partition: partition_digits(id),
                    });
                }
            }
        }
    }
    if check(id) != 0 {
        return Err(ComponentError::CheckDigit(id));
    }
    Ok(())
}

/// Builds a well-formed identifier from an item number and a partition.
///
/// The result is `item ++ partition ++ check-digit`; fixtures use this to
/// mint identifiers that pass [`is_valid`].
pub fn synthetic_id(item: i64, partition: Partition) -> SctId {
    let partition_digits: i64 = match partition {
        Partition::Concept => 0,
        Partition::Description => 1,
        Partition::Relationship => 2,
    };
    let payload = item * 100 + partition_digits;
    payload * 10 + i64::from(check_digit_for(payload))
}

/// Computes the check digit to append to a payload of digits.
fn check_digit_for(payload: i64) -> u8 {
    let mut c = 0u8;
    let mut n = payload;
    // Position 0 is reserved for the yet-to-be-appended check digit.
    let mut i = 1usize;
    loop {
        let digit = (n % 10) as usize;
        c = D[c as usize][P[i % 8][digit] as usize];
        n /= 10;
        i += 1;
        if n == 0 {
            break;
        }
    }
    INV[c as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_concept_ids_valid() {
        // Multiple sclerosis, appendicectomy, IS-A, the SNOMED CT root.
        for id in [24700007, 80146002, 116680003, 138875005, 404684003] {
            assert!(is_valid(id), "{id} should be valid");
            assert_eq!(partition(id), Some(Partition::Concept));
        }
    }

    #[test]
    fn test_description_partition() {
        assert_eq!(partition(754786011), Some(Partition::Description));
        assert!(is_valid(754786011));
    }

    #[test]
    fn test_corrupted_check_digit() {
        assert!(!is_valid(24700008));
        assert_eq!(
            validate(24700008, None),
            Err(ComponentError::CheckDigit(24700008))
        );
    }

    #[test]
    fn test_unrecognised_partition() {
        // Partition digits 99.
        let id = 123_990;
        assert_eq!(partition(id), None);
        assert!(matches!(
            validate(id, None),
            Err(ComponentError::InvalidPartition { partition: 99, .. })
        ));
    }

    #[test]
    fn test_partition_mismatch() {
        assert!(validate(24700007, Some(Partition::Description)).is_err());
        assert!(validate(24700007, Some(Partition::Concept)).is_ok());
    }

    #[test]
    fn test_non_positive() {
        assert!(!is_valid(0));
        assert!(!is_valid(-24700007));
        assert_eq!(validate(0, None), Err(ComponentError::NotPositive(0)));
    }

    #[test]
    fn test_synthetic_ids_verify() {
        for item in [1i64, 7, 42, 999, 123_456] {
            for p in [Partition::Concept, Partition::Description, Partition::Relationship] {
                let id = synthetic_id(item, p);
                assert!(is_valid(id), "synthetic {id} should be valid");
                assert_eq!(partition(id), Some(p));
            }
        }
    }

    #[test]
    fn test_synthetic_ids_distinct_per_partition() {
        let c = synthetic_id(5, Partition::Concept);
        let d = synthetic_id(5, Partition::Description);
        let r = synthetic_id(5, Partition::Relationship);
        assert_ne!(c, d);
        assert_ne!(d, r);
    }
}
