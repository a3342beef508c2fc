//! Key material loading and generation.
//!
//! Read-only with respect to existing keys: material is created only
//! when none exists at the given path. Certificate issuance itself is
//! out of scope; the self-signed generator here is for enrollment and
//! tests, and verifiers must be handed the certificate as their trust
//! anchor.

use std::fs;
use std::path::Path;

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use rand::rngs::OsRng;
use tracing::info;

use crate::error::{PixsealError, Result};

/// Ed25519 signing key plus its derived public key.
pub struct Ed25519KeyMaterial {
    signing: SigningKey,
}

impl Ed25519KeyMaterial {
    /// Load a PKCS#8 PEM private key, or generate and persist one if the
    /// path does not exist yet. Existing key files are never rewritten.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            let pem = fs::read_to_string(path)
                .map_err(|e| PixsealError::KeyUnavailable(format!("{}: {e}", path.display())))?;
            let signing = SigningKey::from_pkcs8_pem(&pem)
                .map_err(|e| PixsealError::KeyUnavailable(format!("{}: {e}", path.display())))?;
            return Ok(Self { signing });
        }

        let signing = SigningKey::generate(&mut OsRng);
        let pem = signing
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| PixsealError::KeyUnavailable(e.to_string()))?;
        fs::write(path, pem.as_bytes())?;
        set_mode(path, 0o600)?;
        info!(path = %path.display(), "generated new Ed25519 private key");
        Ok(Self { signing })
    }

    /// Wrap an existing 32-byte secret, e.g. one provisioned at
    /// manufacturing time.
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    /// Export the SPKI public key PEM, world-readable.
    pub fn export_public_pem(&self, path: &Path) -> Result<()> {
        let pem = self
            .signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| PixsealError::KeyUnavailable(e.to_string()))?;
        fs::write(path, pem.as_bytes())?;
        set_mode(path, 0o644)?;
        Ok(())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Raw 32-byte public key, as embedded in self-contained proofs.
    pub fn public_key_raw(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing
    }
}

/// RSA private key plus the X.509 certificate distributed to verifiers.
#[derive(Debug)]
pub struct CertificateKeyMaterial {
    pkey: PKey<Private>,
    cert: X509,
}

impl CertificateKeyMaterial {
    pub fn from_pem(key_pem: &[u8], cert_pem: &[u8]) -> Result<Self> {
        let pkey = PKey::private_key_from_pem(key_pem)
            .map_err(|e| PixsealError::KeyUnavailable(format!("private key: {e}")))?;
        let cert = X509::from_pem(cert_pem)
            .map_err(|e| PixsealError::KeyUnavailable(format!("certificate: {e}")))?;
        Ok(Self { pkey, cert })
    }

    pub fn from_files(key_path: &Path, cert_path: &Path) -> Result<Self> {
        let key_pem = fs::read(key_path)
            .map_err(|e| PixsealError::KeyUnavailable(format!("{}: {e}", key_path.display())))?;
        let cert_pem = fs::read(cert_path)
            .map_err(|e| PixsealError::KeyUnavailable(format!("{}: {e}", cert_path.display())))?;
        Self::from_pem(&key_pem, &cert_pem)
    }

    /// Generate a self-signed RSA-2048 certificate for device enrollment
    /// or tests.
    pub fn generate_self_signed(common_name: &str) -> Result<Self> {
        Self::self_signed(common_name)
            .map_err(|e| PixsealError::KeyUnavailable(format!("certificate generation: {e}")))
    }

    fn self_signed(common_name: &str) -> std::result::Result<Self, openssl::error::ErrorStack> {
        use openssl::asn1::Asn1Time;
        use openssl::bn::BigNum;
        use openssl::hash::MessageDigest;
        use openssl::rsa::Rsa;
        use openssl::x509::extension::{BasicConstraints, KeyUsage};
        use openssl::x509::{X509Builder, X509NameBuilder};

        let rsa = Rsa::generate(2048)?;
        let pkey = PKey::from_rsa(rsa)?;

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;

        let serial = BigNum::from_u32(1)?.to_asn1_integer()?;
        builder.set_serial_number(&serial)?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_text("O", "Pixseal Device")?;
        name.append_entry_by_text("CN", common_name)?;
        let name = name.build();
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;

        let not_before = Asn1Time::days_from_now(0)?;
        let not_after = Asn1Time::days_from_now(365)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;

        builder.set_pubkey(&pkey)?;
        builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
        builder.append_extension(KeyUsage::new().critical().digital_signature().build()?)?;
        builder.sign(&pkey, MessageDigest::sha256())?;

        Ok(Self {
            pkey,
            cert: builder.build(),
        })
    }

    /// PEM forms of the private key (PKCS#8) and certificate.
    pub fn to_pem(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let key_pem = self
            .pkey
            .private_key_to_pem_pkcs8()
            .map_err(|e| PixsealError::KeyUnavailable(e.to_string()))?;
        let cert_pem = self
            .cert
            .to_pem()
            .map_err(|e| PixsealError::KeyUnavailable(e.to_string()))?;
        Ok((key_pem, cert_pem))
    }

    /// DER SPKI bytes of the certificate's public key, embedded in the
    /// payload for parity with the raw scheme.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        self.cert
            .public_key()
            .and_then(|k| k.public_key_to_der())
            .map_err(|e| PixsealError::KeyUnavailable(e.to_string()))
    }

    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.pkey
    }

    pub(crate) fn cert(&self) -> &X509 {
        &self.cert
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
