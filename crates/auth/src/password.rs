//! Passwort-Hashing mit Argon2id
//!
//! Stellt sichere Passwort-Hashfunktionen mit Argon2id bereit.
//! Die Kostenparameter sind konfigurierbar; der Standard folgt den
//! OWASP-Richtlinien.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::AuthError;

/// Argon2id-Kostenparameter
///
/// Standard gemaess OWASP-Empfehlungen (Stand 2024):
/// - Speicher: 64 MiB
/// - Iterationen: 3
/// - Parallelismus: 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParameter {
    pub speicher_kib: u32,
    pub iterationen: u32,
}

impl Default for HashParameter {
    fn default() -> Self {
        Self {
            speicher_kib: 64 * 1024,
            iterationen: 3,
        }
    }
}

fn argon2_instanz(parameter: HashParameter) -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(parameter.speicher_kib, parameter.iterationen, 1, None)
        .map_err(|e| AuthError::PasswortHashing(format!("Argon2-Parameter ungueltig: {e}")))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hasht ein Passwort mit Argon2id und einem zufaelligen Salt
///
/// Gibt den PHC-String zurueck (inkl. Algorithmus, Parameter und Salt).
pub fn passwort_hashen(passwort: &str, parameter: HashParameter) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    argon2_instanz(parameter)?
        .hash_password(passwort.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswortHashing(e.to_string()))
}

/// Verifiziert ein Passwort gegen einen gespeicherten PHC-Hash
///
/// Die Kostenparameter stammen aus dem Hash selbst, aeltere Eintraege mit
/// anderen Parametern bleiben daher gueltig.
pub fn passwort_verifizieren(passwort: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswortHashing(format!("Ungueltiges Hash-Format: {e}")))?;

    match Argon2::default().verify_password(passwort.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswortHashing(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUENSTIG: HashParameter = HashParameter {
        speicher_kib: 8,
        iterationen: 1,
    };

    #[test]
    fn passwort_hashen_und_verifizieren() {
        let hash = passwort_hashen("sicheres_passwort_123!", GUENSTIG).expect("Hashing fehlgeschlagen");

        assert!(
            hash.starts_with("$argon2id$"),
            "Hash muss mit $argon2id$ beginnen"
        );
        assert!(!hash.contains(':'), "PHC-String darf kein ':' enthalten");

        let korrekt = passwort_verifizieren("sicheres_passwort_123!", &hash)
            .expect("Verifikation fehlgeschlagen");
        assert!(korrekt);
    }

    #[test]
    fn falsches_passwort_wird_abgelehnt() {
        let hash = passwort_hashen("richtiges_passwort", GUENSTIG).expect("Hashing fehlgeschlagen");

        let korrekt =
            passwort_verifizieren("falsches_passwort", &hash).expect("Verifikation fehlgeschlagen");
        assert!(!korrekt, "Falsches Passwort muss abgelehnt werden");
    }

    #[test]
    fn gleiche_passwoerter_unterschiedliche_hashes() {
        let hash1 = passwort_hashen("gleich", GUENSTIG).unwrap();
        let hash2 = passwort_hashen("gleich", GUENSTIG).unwrap();
        assert_ne!(hash1, hash2, "Salt muss sich unterscheiden");
    }

    #[test]
    fn ungueltige_parameter_geben_fehler() {
        let kaputt = HashParameter {
            speicher_kib: 0,
            iterationen: 0,
        };
        assert!(passwort_hashen("x", kaputt).is_err());
    }

    #[test]
    fn ungueltiges_hash_format_gibt_fehler() {
        assert!(passwort_verifizieren("passwort", "kein_gueltiger_hash").is_err());
    }
}
