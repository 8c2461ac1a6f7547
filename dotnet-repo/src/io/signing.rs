//! Strong-name signing key generation.

use anyhow::{Context, Result, anyhow};
use rsa::RsaPrivateKey;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use tracing::{debug, instrument};

use crate::core::key_blob::{RsaKeyParts, encode_private_key_blob};

/// Generate a fresh RSA key of `bits` bits as a `PRIVATEKEYBLOB`.
#[instrument]
pub fn generate_strong_name_key(bits: u32) -> Result<Vec<u8>> {
    debug!("generating RSA key");
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, bits as usize).context("generate RSA key")?;
    let parts = key_parts(&key, bits)?;
    encode_private_key_blob(&parts).context("encode private key blob")
}

fn key_parts(key: &RsaPrivateKey, bits: u32) -> Result<RsaKeyParts> {
    let primes = key.primes();
    if primes.len() != 2 {
        return Err(anyhow!("expected a two-prime RSA key, got {} primes", primes.len()));
    }
    let dp = key.dp().context("key is missing CRT exponent dp")?;
    let dq = key.dq().context("key is missing CRT exponent dq")?;
    let (_, qinv) = key
        .qinv()
        .context("key is missing CRT coefficient")?
        .to_bytes_be();

    Ok(RsaKeyParts {
        bit_len: bits,
        public_exponent: key.e().to_bytes_be(),
        modulus: key.n().to_bytes_be(),
        prime1: primes[0].to_bytes_be(),
        prime2: primes[1].to_bytes_be(),
        exponent1: dp.to_bytes_be(),
        exponent2: dq.to_bytes_be(),
        coefficient: qinv,
        private_exponent: key.d().to_bytes_be(),
    })
}
