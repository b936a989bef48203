//! Login password synthesis.
//!
//! Generated passwords have a fixed shape: five letters, one special
//! character, five digits. The RNG is injected so tests are deterministic.

use crate::provider::SourceImage;
use rand::Rng;

/// Letters used for the first five characters.
pub const PASSWORD_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
/// Special characters used for the sixth character.
pub const PASSWORD_SPECIALS: &str = "-_";
/// Digits used for the last five characters.
pub const PASSWORD_DIGITS: &str = "1234567890";

/// The password to put in the create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPassword {
    /// Password value.
    pub value: String,
    /// True if it was generated and should be written back into the config.
    pub generated: bool,
}

fn push_from_charset<R: Rng + ?Sized>(out: &mut String, rng: &mut R, len: usize, charset: &str) {
    let bytes = charset.as_bytes();
    for _ in 0..len {
        out.push(char::from(bytes[rng.gen_range(0..bytes.len())]));
    }
}

/// Generates an 11 character password: 5 letters, 1 special, 5 digits.
pub fn generate_password<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut password = String::with_capacity(11);
    push_from_charset(&mut password, rng, 5, PASSWORD_LETTERS);
    push_from_charset(&mut password, rng, 1, PASSWORD_SPECIALS);
    push_from_charset(&mut password, rng, 5, PASSWORD_DIGITS);
    password
}

/// Picks the login password for an image.
///
/// Only Linux images without a configured password get a generated one;
/// anything else passes through unchanged (an absent password stays empty).
pub fn resolve_password<R: Rng + ?Sized>(
    image: &SourceImage,
    configured: Option<&str>,
    rng: &mut R,
) -> ResolvedPassword {
    match configured.filter(|p| !p.is_empty()) {
        None if image.is_linux() => ResolvedPassword {
            value: generate_password(rng),
            generated: true,
        },
        configured => ResolvedPassword {
            value: configured.unwrap_or_default().to_string(),
            generated: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OsType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn image(os_type: OsType) -> SourceImage {
        SourceImage {
            image_id: "uimage-1".into(),
            os_type,
            image_size_gb: 20,
        }
    }

    #[test]
    fn test_generated_password_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let password = generate_password(&mut rng);
            assert_eq!(password.len(), 11);

            let chars: Vec<char> = password.chars().collect();
            assert!(chars[..5].iter().all(|c| PASSWORD_LETTERS.contains(*c)), "{password}");
            assert!(PASSWORD_SPECIALS.contains(chars[5]), "{password}");
            assert!(chars[6..].iter().all(|c| PASSWORD_DIGITS.contains(*c)), "{password}");
        }
    }

    #[test]
    fn test_generation_is_deterministic_for_a_seed() {
        let a = generate_password(&mut StdRng::seed_from_u64(7));
        let b = generate_password(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_linux_without_password_generates() {
        let resolved = resolve_password(&image(OsType::Linux), None, &mut StdRng::seed_from_u64(1));
        assert!(resolved.generated);
        assert_eq!(resolved.value.len(), 11);

        let resolved = resolve_password(&image(OsType::Linux), Some(""), &mut StdRng::seed_from_u64(1));
        assert!(resolved.generated);
    }

    #[test]
    fn test_configured_password_passes_through() {
        let resolved = resolve_password(
            &image(OsType::Linux),
            Some("Hunter2-pass"),
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(
            resolved,
            ResolvedPassword { value: "Hunter2-pass".into(), generated: false }
        );
    }

    #[test]
    fn test_non_linux_skips_generation() {
        let mut rng = StdRng::seed_from_u64(1);
        let resolved = resolve_password(&image(OsType::Windows), None, &mut rng);
        assert_eq!(resolved, ResolvedPassword { value: String::new(), generated: false });

        let resolved = resolve_password(&image(OsType::Windows), Some("Adm1n_pw"), &mut rng);
        assert_eq!(resolved.value, "Adm1n_pw");
        assert!(!resolved.generated);
    }
}
