use rand::Rng;
use rand::seq::SliceRandom;

use crate::store::Credential;

const FIRST_NAMES: &[&str] = &[
    "Olivia", "Liam", "Emma", "Noah", "Amelia", "Oliver", "Sophia", "Elijah", "Mia", "James",
    "Harper", "Lucas", "Evelyn", "Mateo", "Aria", "Henry", "Layla", "Kenji", "Nadia", "Omar",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Garcia", "Nguyen", "Brown", "Martinez", "Kowalski", "Haddad", "Tanaka",
    "Okafor", "Silva", "Muller", "Rossi", "Dubois", "Novak", "Khan", "Larsen", "Walker", "Reyes", "Kim",
];

const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";
// No quotes, commas or whitespace: values must survive any CSV reader
const SYMBOLS: &[u8] = b"!@#$%^&*-_+=?";

const MIN_PASSWORD_LENGTH: usize = 4;

/// Produces fresh identities when the pool cannot supply one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialGenerator {
    domain: String,
    password_length: usize,
}

impl Default for CredentialGenerator {
    fn default() -> Self {
        Self::new("example.test", 12)
    }
}

impl CredentialGenerator {
    pub fn new(domain: impl Into<String>, password_length: usize) -> Self {
        Self {
            domain: domain.into(),
            password_length: password_length.max(MIN_PASSWORD_LENGTH),
        }
    }

    pub fn generate(&self) -> Credential {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Generate using the given random source
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Credential {
        let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
        let suffix: u16 = rng.gen_range(0..10_000);

        let name = format!("{} {}", first, last);
        let email = format!("{}.{}{:04}@{}", first, last, suffix, self.domain).to_lowercase();
        let password = self.password(rng);

        Credential::new(name, email, password)
    }

    /// Random password with at least one character from every class
    fn password<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
        let all: Vec<u8> = classes.concat();

        let mut bytes: Vec<u8> = classes
            .iter()
            .map(|class| class[rng.gen_range(0..class.len())])
            .collect();
        while bytes.len() < self.password_length {
            bytes.push(all[rng.gen_range(0..all.len())]);
        }
        bytes.shuffle(rng);

        bytes.into_iter().map(char::from).collect()
    }
}
