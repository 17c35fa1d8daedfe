/// Property-based tests for the credential hasher and token issuer using proptest
///
/// Argon2 runs at its minimal cost here, and the case count is kept low
/// because every case hashes at least once.
use chrono::Duration;
use private_instruction::auth::{CredentialHasher, HashCost, TokenIssuer};
use proptest::prelude::*;

fn hasher() -> CredentialHasher {
    CredentialHasher::new("proptest_pepper".to_string(), HashCost::minimal())
        .expect("minimal cost is valid")
}

// Strategy for passwords: printable, non-empty, bounded
fn password_strategy() -> impl Strategy<Value = String> {
    "[ -~]{1,64}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_hash_verifies_own_plaintext(password in password_strategy()) {
        let hasher = hasher();
        let hash = hasher.hash(&password).unwrap();
        prop_assert!(hasher.verify(&hash, &password));
    }

    #[test]
    fn prop_hash_rejects_other_plaintext(
        password in password_strategy(),
        other in password_strategy(),
    ) {
        prop_assume!(password != other);
        let hasher = hasher();
        let hash = hasher.hash(&password).unwrap();
        prop_assert!(!hasher.verify(&hash, &other));
    }

    #[test]
    fn prop_foreign_secret_never_verifies(account_id in 1i64..1_000_000) {
        let ours = TokenIssuer::new(b"proptest_jwt_secret_0123456789abcdef", Duration::minutes(15));
        let theirs = TokenIssuer::new(b"another_secret_entirely_0123456789ab", Duration::minutes(15));
        let token = theirs.issue_access_token(account_id, "mallory").unwrap();
        prop_assert!(ours.verify_access_token(&token).is_err());
    }
}

#[test]
fn test_malformed_hash_is_false() {
    let hasher = hasher();
    assert!(!hasher.verify("not-a-phc-string", "pw1"));
    assert!(!hasher.verify("", ""));
}
