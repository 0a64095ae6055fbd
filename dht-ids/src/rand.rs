use rand::rngs::OsRng;
use rand::RngCore;

/// Fill `buf` with secure random bytes drawn from the OS's secure random
/// device (`/dev/urandom` or equivalent), per spec.md §4.A.
pub fn random_bytes(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// A random port, rejection-sampled to avoid the value `0`.
pub fn random_port() -> u16 {
    loop {
        let mut buf = [0u8; 2];
        random_bytes(&mut buf);
        let port = u16::from_ne_bytes(buf);
        if port != 0 {
            return port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_port_is_never_zero() {
        for _ in 0..1000 {
            assert_ne!(random_port(), 0);
        }
    }
}
