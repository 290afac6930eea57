use rand::Rng;

/// Length of every generated token and check id.
pub const ID_LEN: usize = 20;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Fresh random id for a token or check record.
pub fn random_id() -> String {
    random_string(ID_LEN)
}

/// Random lowercase alphanumeric string of `len` characters.
pub fn random_string(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Whether `id` has the shape of a generated id.
pub fn is_generated_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| ID_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_fixed_shape() {
        for _ in 0..50 {
            let id = random_id();
            assert!(is_generated_id(&id), "unexpected id {id}");
        }
    }

    #[test]
    fn ids_do_not_repeat() {
        let a = random_id();
        let b = random_id();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_foreign_shapes() {
        assert!(!is_generated_id(""));
        assert!(!is_generated_id("ABCDEFGHIJKLMNOPQRST"));
        assert!(!is_generated_id("abc"));
        assert!(!is_generated_id("../../../etc/passwdx"));
    }
}
