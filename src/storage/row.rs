//! Row encoding (spec.md §3): `(id: u32, username: char[32], email: char[255])`,
//! zero-padded, NUL-terminated, fixed width. Grounded in the teacher's
//! `storage/row.rs`, narrowed from the teacher's schema-driven `HashMap`
//! row to this system's one fixed shape — schema evolution is a declared
//! non-goal.

use crate::error::{Error, Result};

pub const USERNAME_LEN: usize = 32;
pub const EMAIL_LEN: usize = 255;
pub const ID_SIZE: usize = 4;
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_LEN + EMAIL_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: [u8; USERNAME_LEN],
    pub email: [u8; EMAIL_LEN],
}

impl Row {
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self> {
        Ok(Row {
            id,
            username: str_to_fixed_bytes(username, "username")?,
            email: str_to_fixed_bytes(email, "email")?,
        })
    }

    pub fn username_str(&self) -> String {
        fixed_bytes_to_string(&self.username)
    }

    pub fn email_str(&self) -> String {
        fixed_bytes_to_string(&self.email)
    }

    pub fn encode(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), ROW_SIZE);
        buf[0..ID_SIZE].copy_from_slice(&self.id.to_ne_bytes());
        buf[ID_SIZE..ID_SIZE + USERNAME_LEN].copy_from_slice(&self.username);
        buf[ID_SIZE + USERNAME_LEN..ROW_SIZE].copy_from_slice(&self.email);
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != ROW_SIZE {
            return Err(Error::Storage(format!(
                "row buffer size mismatch: expected {}, got {}",
                ROW_SIZE,
                buf.len()
            )));
        }
        let id = u32::from_ne_bytes(buf[0..ID_SIZE].try_into().unwrap());
        let mut username = [0u8; USERNAME_LEN];
        username.copy_from_slice(&buf[ID_SIZE..ID_SIZE + USERNAME_LEN]);
        let mut email = [0u8; EMAIL_LEN];
        email.copy_from_slice(&buf[ID_SIZE + USERNAME_LEN..ROW_SIZE]);
        Ok(Row {
            id,
            username,
            email,
        })
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username_str(), self.email_str())
    }
}

fn str_to_fixed_bytes<const N: usize>(input: &str, field: &str) -> Result<[u8; N]> {
    let bytes = input.as_bytes();
    if bytes.len() >= N {
        return Err(Error::Storage(format!(
            "{} exceeds max length {} (incl. NUL terminator)",
            field,
            N - 1
        )));
    }
    let mut buf = [0u8; N];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

fn fixed_bytes_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Lexicographic comparison ignoring NUL padding (Design Notes: `"ab"` is
/// not less than `"ab\0"` — both trim to the same effective sequence).
pub fn compare_fixed_str(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    let a_end = a.iter().position(|&b| b == 0).unwrap_or(a.len());
    let b_end = b.iter().position(|&b| b == 0).unwrap_or(b.len());
    a[..a_end].cmp(&b[..b_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let row = Row::new(42, "alice", "a@x.com").unwrap();
        let mut buf = [0u8; ROW_SIZE];
        row.encode(&mut buf);
        let decoded = Row::decode(&buf).unwrap();
        assert_eq!(row, decoded);
        assert_eq!(decoded.username_str(), "alice");
        assert_eq!(decoded.email_str(), "a@x.com");
    }

    #[test]
    fn rejects_username_that_does_not_fit() {
        let too_long = "x".repeat(USERNAME_LEN);
        assert!(Row::new(1, &too_long, "a@x.com").is_err());
    }

    #[test]
    fn fixed_str_comparison_ignores_nul_padding() {
        let a = Row::new(1, "ab", "").unwrap();
        let b = Row::new(2, "ab\0", "").unwrap(); // NUL embedded, trims identically
        assert_eq!(
            compare_fixed_str(&a.username, &b.username),
            std::cmp::Ordering::Equal
        );
    }
}
