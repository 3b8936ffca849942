use subtle::ConstantTimeEq;

/// Outcome of checking a presented password against the stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Valid,
    /// Stored value is the plaintext itself (row predates hashing).
    LegacyPlaintext,
    Invalid,
}

pub fn hash_password(password: &str, cost: u32) -> anyhow::Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn check_password(password: &str, stored: &str) -> PasswordCheck {
    match bcrypt::verify(password, stored) {
        Ok(true) => PasswordCheck::Valid,
        Ok(false) => PasswordCheck::Invalid,
        // Not a bcrypt hash: only then can the column hold a plaintext password.
        Err(_) if !stored.is_empty() && bool::from(password.as_bytes().ct_eq(stored.as_bytes())) => {
            PasswordCheck::LegacyPlaintext
        }
        Err(_) => PasswordCheck::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("123456", 4).unwrap();
        assert_eq!(check_password("123456", &hash), PasswordCheck::Valid);
        assert_eq!(check_password("654321", &hash), PasswordCheck::Invalid);
    }

    #[test]
    fn plaintext_row_is_flagged_for_migration() {
        assert_eq!(check_password("123456", "123456"), PasswordCheck::LegacyPlaintext);
        assert_eq!(check_password("123457", "123456"), PasswordCheck::Invalid);
    }

    #[test]
    fn hash_text_itself_is_not_a_legacy_match() {
        let hash = hash_password("123456", 4).unwrap();
        // Presenting the hash verbatim equals the stored column but must not log in.
        assert_eq!(check_password(&hash, &hash), PasswordCheck::Invalid);
    }
}
