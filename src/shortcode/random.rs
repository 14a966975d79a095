use rand::RngExt;

use super::CodeGenerator;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Fixed-length random alphanumeric codes
pub struct RandomCodeGenerator {
    length: usize,
}

impl RandomCodeGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }
}

pub(crate) fn random_alphanumeric(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, _attempt: u32) -> String {
        random_alphanumeric(self.length)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
