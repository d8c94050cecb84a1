//! A duplicate id is the plain entity id prefixed with `_`. Every read/delete
//! entrypoint accepts either form; `IsDuplId` / `GetRealId` / `GetDuplId`
//! normalize between them.

pub const DUPL_PREFIX: char = '_';

/// `IsDuplId(x) == (x[0]=='_')`
pub fn is_dupl_id(fid: &str) -> bool {
    fid.starts_with(DUPL_PREFIX)
}

/// Strips the `_` prefix if present, otherwise returns `fid` unchanged.
pub fn get_real_id(fid: &str) -> &str {
    fid.strip_prefix(DUPL_PREFIX).unwrap_or(fid)
}

/// Adds the `_` prefix if not already present.
pub fn get_dupl_id(fid: &str) -> String {
    if is_dupl_id(fid) {
        fid.to_string()
    } else {
        format!("{DUPL_PREFIX}{fid}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_and_dupl_round_trip() {
        let real = "507f1f77bcf86cd799439011";
        let dupl = get_dupl_id(real);
        assert_eq!(dupl, "_507f1f77bcf86cd799439011");
        assert!(is_dupl_id(&dupl));
        assert!(!is_dupl_id(real));
        assert_eq!(get_real_id(&dupl), real);
        assert_eq!(get_real_id(real), real);
    }

    #[test]
    fn get_dupl_id_is_idempotent() {
        let real = "abc123";
        let once = get_dupl_id(real);
        let twice = get_dupl_id(&once);
        assert_eq!(once, twice);
    }

    // Property: GetDuplId(GetRealId(fid)) == GetDuplId(fid), and
    // IsDuplId(GetDuplId(x)) is always true (testable property #2).
    #[test]
    fn dupl_id_property_holds_for_both_forms() {
        for fid in ["plain_id_1", "_already_dupl_2"] {
            assert_eq!(get_dupl_id(get_real_id(fid)), get_dupl_id(fid));
            assert!(is_dupl_id(&get_dupl_id(fid)));
        }
    }
}
