use rand::Rng;

/// Letters allowed in the prefix of an order id.
pub const ORDER_ID_ALPHABET: &[u8] = b"CDEFHJKMNPRTVWXY";

/// How many fresh ids a checkout tries before giving up.
pub const MAX_ID_ATTEMPTS: usize = 5;

/// Two letters followed by four digits, e.g. `KX0427`.
pub fn generate_order_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let a = ORDER_ID_ALPHABET[rng.gen_range(0..ORDER_ID_ALPHABET.len())] as char;
    let b = ORDER_ID_ALPHABET[rng.gen_range(0..ORDER_ID_ALPHABET.len())] as char;
    format!("{}{}{:04}", a, b, rng.gen_range(0..10_000))
}

pub fn is_valid_order_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    bytes.len() == 6
        && bytes[..2].iter().all(|b| ORDER_ID_ALPHABET.contains(b))
        && bytes[2..].iter().all(u8::is_ascii_digit)
}

/// Source of candidate order ids, swappable so collisions can be forced in tests.
pub trait OrderIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

pub struct RandomOrderIds;

impl OrderIdGenerator for RandomOrderIds {
    fn next_id(&self) -> String {
        generate_order_id(&mut rand::thread_rng())
    }
}
