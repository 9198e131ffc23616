//
// Cryptographic helpers shared by CHAP, L2TP tunnel authentication and
// IS-IS HMAC-MD5 authentication.
//
// None of these protocols are modeled as real authentication of end users;
// they exist to produce byte-identical digests so that a real peer's
// challenge/response exchange completes.
//

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};

type HmacMd5 = Hmac<Md5>;

/// CHAP / L2TP-challenge style digest: MD5(identifier || secret || challenge).
pub fn chap_response(identifier: u8, secret: &[u8], challenge: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update([identifier]);
    hasher.update(secret);
    hasher.update(challenge);
    hasher.finalize().into()
}

/// HMAC-MD5 digest used by IS-IS authentication (RFC 5304) and by L2TP's
/// optional tunnel-authentication AVP.
pub fn hmac_md5(key: &[u8], message: &[u8]) -> [u8; 16] {
    let mut mac =
        HmacMd5::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chap_response_is_deterministic() {
        let a = chap_response(7, b"secret", b"challenge");
        let b = chap_response(7, b"secret", b"challenge");
        assert_eq!(a, b);
    }

    #[test]
    fn chap_response_depends_on_identifier() {
        let a = chap_response(1, b"secret", b"challenge");
        let b = chap_response(2, b"secret", b"challenge");
        assert_ne!(a, b);
    }

    #[test]
    fn hmac_md5_is_16_bytes() {
        let digest = hmac_md5(b"key", b"message");
        assert_eq!(digest.len(), 16);
    }
}
