//! Pure name canonicalization between user-facing station names and the
//! internal stream names handed to the stream engine.
//!
//! External names are restricted to a charset that the stream engine's
//! token-delimited subject/stream naming can't represent directly (`.`
//! collides with subject-token separation); canonicalization substitutes
//! it for a byte (`#`) the engine accepts and the external charset forbids,
//! so the substitution is trivially reversible with no escaping needed.

use station_domain::Error;

const MAX_NAME_LEN: usize = 128;
const INTERNAL_DELIM: char = '#';
const EXTERNAL_DELIM: char = '.';

/// An external/internal name pair produced by a successful canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub external: String,
    pub internal: String,
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' || c == '_'
}

fn validate_external(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidName(name.to_string()));
    }
    if !name.chars().all(is_allowed_char) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Canonicalize a user-supplied station name into its external/internal pair.
///
/// The input is lowercased before validation, matching the presentation
/// layer's "names are case-insensitive" contract.
pub fn canonical(name: &str) -> Result<Canonical, Error> {
    let external = name.to_lowercase();
    validate_external(&external)?;
    let internal = external.replace(EXTERNAL_DELIM, &INTERNAL_DELIM.to_string());
    Ok(Canonical { external, internal })
}

/// Recover the external/internal pair from an internal stream name.
///
/// Inverse of [`canonical`]: since `#` never appears in a validated external
/// name, substituting it back for `.` is unambiguous.
pub fn from_internal(stream: &str) -> Result<Canonical, Error> {
    let external = stream.replace(INTERNAL_DELIM, &EXTERNAL_DELIM.to_string());
    validate_external(&external)?;
    Ok(Canonical {
        external,
        internal: stream.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name_round_trips_identically() {
        let c = canonical("orders").unwrap();
        assert_eq!(c.external, "orders");
        assert_eq!(c.internal, "orders");
    }

    #[test]
    fn dotted_name_substitutes_delimiter() {
        let c = canonical("orders.eu.west").unwrap();
        assert_eq!(c.internal, "orders#eu#west");
    }

    #[test]
    fn lowercases_input() {
        let c = canonical("Orders.EU").unwrap();
        assert_eq!(c.external, "orders.eu");
    }

    #[test]
    fn dash_and_underscore_pass_through() {
        let c = canonical("orders-eu_west").unwrap();
        assert_eq!(c.internal, "orders-eu_west");
    }

    #[test]
    fn from_internal_is_inverse_of_canonical() {
        let forward = canonical("orders.eu.west").unwrap();
        let back = from_internal(&forward.internal).unwrap();
        assert_eq!(back, forward);
    }

    #[test]
    fn rejects_empty_name() {
        assert!(canonical("").is_err());
    }

    #[test]
    fn rejects_oversized_name() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(canonical(&long).is_err());
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert!(canonical("orders/eu").is_err());
        assert!(canonical("orders eu").is_err());
        assert!(canonical("orders#eu").is_err());
    }
}
