//! Protected APDU envelopes
//!
//! Ciphered APDUs travel either in the service specific glo-/ded- form,
//! which carries only the ciphered packet, or in the general-glo/ded form
//! that also names the sender's system title. Signed APDUs use the
//! general-signing form. [`protect`] and [`unprotect`] apply both in the
//! order the cipher is configured for.

use crate::conformance::Conformance;
use crate::error::{DlmsError, DlmsResult};
use crate::settings::{ConnectionState, Settings};
use dlms_asn1::PduType;
use dlms_core::ByteBuffer;
use dlms_core::helpers::set_object_count;
use dlms_security::{
    AesGcmParameter, CertificateType, Cipher, Deciphered, Ecdsa, KeyType, Security,
    SignCipherOrder, Signing, SystemTitle, decrypt, encrypt,
};
use log::{debug, warn};

fn cipher_of(settings: &Settings) -> DlmsResult<&Cipher> {
    settings
        .cipher()
        .ok_or_else(|| DlmsError::Security("cipher is not set".to_string()))
}

fn cipher_mut_of(settings: &mut Settings) -> DlmsResult<&mut Cipher> {
    settings
        .cipher_mut()
        .ok_or_else(|| DlmsError::Security("cipher is not set".to_string()))
}

/// Envelope tag for ciphering `pdu`.
fn envelope_tag(settings: &Settings, cipher: &Cipher, pdu: &[u8]) -> DlmsResult<(PduType, bool)> {
    let command = pdu
        .first()
        .ok_or_else(|| DlmsError::IncompletePdu("nothing to cipher".to_string()))?;
    let command = PduType::from_u8(*command).ok();
    let dedicated = cipher.dedicated_key().is_some();
    let service = command.and_then(|c| if dedicated { c.ded() } else { c.glo() });
    let general = settings
        .negotiated_conformance()
        .contains(Conformance::GENERAL_PROTECTION);
    Ok(match service {
        Some(tag) if !general => (tag, false),
        _ if dedicated => (PduType::GeneralDedCiphering, true),
        _ => (PduType::GeneralGloCiphering, true),
    })
}

/// Cipher `pdu` with the next invocation counter of the settings' cipher.
///
/// The output is the envelope tag, the sender system title for the
/// general forms, and the length prefixed packet
/// `security control | invocation counter | ciphered text | tag`.
pub fn cipher_pdu(settings: &mut Settings, pdu: &[u8]) -> DlmsResult<Vec<u8>> {
    let (tag, general) = envelope_tag(settings, cipher_of(settings)?, pdu)?;
    let cipher = cipher_mut_of(settings)?;
    let security = cipher.security();
    if security == Security::None {
        return Err(DlmsError::Security("security is not enabled".to_string()));
    }
    let mut p = cipher.aes_gcm_parameter(security, false)?;
    p.invocation_counter = cipher.next_invocation_counter()?;
    let packet = encrypt(&p, pdu)?;
    debug!(
        "Ciphered {} byte APDU as {} with IC {}",
        pdu.len(),
        tag.name(),
        p.invocation_counter
    );

    let mut out = Vec::with_capacity(packet.len() + 14);
    out.push(tag.to_u8());
    if general {
        set_object_count(p.system_title.len(), &mut out);
        out.extend_from_slice(&p.system_title);
    }
    set_object_count(packet.len(), &mut out);
    out.extend_from_slice(&packet);
    settings.set_connection_state(settings.connection_state() | ConnectionState::CIPHERED);
    Ok(out)
}

/// Decipher an envelope produced by the peer's [`cipher_pdu`].
///
/// The sender title comes from the general form or, for the service
/// specific forms, from the cipher's recipient system title. A counter not
/// above the last accepted one is refused after the tag checks out.
pub fn decipher_pdu(settings: &mut Settings, data: &[u8]) -> DlmsResult<Deciphered> {
    let deciphered = {
        let cipher = cipher_of(settings)?;
        let mut buf = ByteBuffer::from_slice(data);
        let tag = PduType::from_u8(buf.pop_u8()?)?;
        let general = matches!(tag, PduType::GeneralGloCiphering | PduType::GeneralDedCiphering);
        if !general && !tag.is_glo() && !tag.is_ded() {
            return Err(DlmsError::Protocol(format!("{} is not a ciphered APDU", tag.name())));
        }
        let title = if general {
            let len = buf.get_object_count()?;
            SystemTitle::from_slice(buf.pop_slice(len)?)?
        } else {
            *cipher.recipient_system_title().ok_or_else(|| {
                DlmsError::InvalidSystemTitle("recipient system title is not set".to_string())
            })?
        };
        let dedicated = tag == PduType::GeneralDedCiphering || tag.is_ded();
        let key = if dedicated {
            cipher.dedicated_key().ok_or_else(|| {
                DlmsError::InvalidKey("dedicated key is not set".to_string())
            })?
        } else {
            cipher.block_cipher_key()
        };
        let len = buf.get_object_count()?;
        if buf.available() < len {
            return Err(DlmsError::IncompletePdu(format!(
                "ciphered packet needs {} bytes, got {}",
                len,
                buf.available()
            )));
        }
        let p = AesGcmParameter::new(
            cipher.security(),
            cipher.security_suite(),
            0,
            title.as_slice(),
            key,
            cipher.authentication_key(),
        );
        decrypt(&p, buf.pop_slice(len)?)?
    };
    settings.check_invocation_counter(deciphered.invocation_counter)?;
    debug!(
        "Deciphered {} byte APDU, IC {}",
        deciphered.data.len(),
        deciphered.invocation_counter
    );
    Ok(deciphered)
}

/// A general-signing APDU
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneralSigning {
    pub transaction_id: Vec<u8>,
    pub originator_system_title: Vec<u8>,
    pub recipient_system_title: Vec<u8>,
    pub date_time: Vec<u8>,
    pub other_information: Vec<u8>,
    pub content: Vec<u8>,
    pub signature: Vec<u8>,
}

impl GeneralSigning {
    /// Everything up to and including the content; the signed part.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut out = vec![PduType::GeneralSigning.to_u8()];
        for field in [
            &self.transaction_id,
            &self.originator_system_title,
            &self.recipient_system_title,
            &self.date_time,
            &self.other_information,
            &self.content,
        ] {
            set_object_count(field.len(), &mut out);
            out.extend_from_slice(field);
        }
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.signed_bytes();
        set_object_count(self.signature.len(), &mut out);
        out.extend_from_slice(&self.signature);
        out
    }

    /// Parse a general-signing APDU, returning it and the length of its signed part.
    pub fn from_bytes(data: &[u8]) -> DlmsResult<(Self, usize)> {
        let mut buf = ByteBuffer::from_slice(data);
        let tag = buf.pop_u8()?;
        if tag != PduType::GeneralSigning.to_u8() {
            return Err(DlmsError::Protocol(format!(
                "expected general-signing, got 0x{:02X}",
                tag
            )));
        }
        let field = |buf: &mut ByteBuffer| -> DlmsResult<Vec<u8>> {
            let len = buf.get_object_count()?;
            buf.pop_vec(len)
        };
        let mut apdu = GeneralSigning {
            transaction_id: field(&mut buf)?,
            originator_system_title: field(&mut buf)?,
            recipient_system_title: field(&mut buf)?,
            date_time: field(&mut buf)?,
            other_information: field(&mut buf)?,
            content: field(&mut buf)?,
            signature: Vec::new(),
        };
        let signed_len = buf.position();
        apdu.signature = field(&mut buf)?;
        Ok((apdu, signed_len))
    }
}

/// Wrap `pdu` in a general-signing APDU signed with the digital signature key.
pub fn sign_pdu(settings: &Settings, pdu: &[u8]) -> DlmsResult<Vec<u8>> {
    let cipher = cipher_of(settings)?;
    let (key, _) = cipher.key_pair(KeyType::DigitalSignature).ok_or_else(|| {
        DlmsError::InvalidKey("digital signature key pair is not set".to_string())
    })?;
    let originator = cipher.system_title().ok_or_else(|| {
        DlmsError::InvalidSystemTitle("own system title is not set".to_string())
    })?;
    let mut apdu = GeneralSigning {
        transaction_id: cipher.transaction_id().map(|t| t.to_vec()).unwrap_or_default(),
        originator_system_title: originator.as_slice().to_vec(),
        recipient_system_title: cipher
            .recipient_system_title()
            .map(|t| t.as_slice().to_vec())
            .unwrap_or_default(),
        content: pdu.to_vec(),
        ..GeneralSigning::default()
    };
    apdu.signature = Ecdsa::sign(key, &apdu.signed_bytes())?;
    debug!("Signed {} byte APDU", pdu.len());
    Ok(apdu.to_bytes())
}

/// Check a general-signing APDU against the originator's certificate and
/// return its content.
pub fn verify_signed_pdu(settings: &Settings, data: &[u8]) -> DlmsResult<Vec<u8>> {
    let cipher = cipher_of(settings)?;
    let (apdu, signed_len) = GeneralSigning::from_bytes(data)?;
    let originator = SystemTitle::from_slice(&apdu.originator_system_title)?;
    let certificate = cipher
        .find_certificate(&originator, CertificateType::DigitalSignature)
        .ok_or_else(|| {
            DlmsError::InvalidCertificate(format!(
                "no digital signature certificate for {}",
                originator
            ))
        })?;
    if !Ecdsa::verify(certificate.public_key(), &data[..signed_len], &apdu.signature)? {
        warn!("Signature of APDU from {} rejected", originator);
        return Err(DlmsError::InvalidSignature(format!(
            "general-signing APDU from {}",
            originator
        )));
    }
    Ok(apdu.content)
}

/// Cipher and/or sign `pdu` as the settings' cipher is configured.
pub fn protect(settings: &mut Settings, pdu: &[u8]) -> DlmsResult<Vec<u8>> {
    let Some(cipher) = settings.cipher() else {
        return Ok(pdu.to_vec());
    };
    let ciphered = cipher.security() != Security::None;
    let signed = cipher.signing() == Signing::GeneralSigning;
    match (ciphered, signed, cipher.sign_cipher_order()) {
        (false, false, _) => Ok(pdu.to_vec()),
        (true, false, _) => cipher_pdu(settings, pdu),
        (false, true, _) => sign_pdu(settings, pdu),
        (true, true, SignCipherOrder::CipherThenSign) => {
            let ciphered = cipher_pdu(settings, pdu)?;
            sign_pdu(settings, &ciphered)
        }
        (true, true, SignCipherOrder::SignThenCipher) => {
            let signed = sign_pdu(settings, pdu)?;
            cipher_pdu(settings, &signed)
        }
    }
}

/// Remove every protection layer from `data` and return the plain APDU.
pub fn unprotect(settings: &mut Settings, data: &[u8]) -> DlmsResult<Vec<u8>> {
    let mut apdu = data.to_vec();
    loop {
        let Some(first) = apdu.first() else {
            return Err(DlmsError::IncompletePdu("empty APDU".to_string()));
        };
        let Ok(tag) = PduType::from_u8(*first) else {
            return Ok(apdu);
        };
        apdu = match tag {
            PduType::GeneralSigning => verify_signed_pdu(settings, &apdu)?,
            PduType::GeneralCiphering => {
                return Err(DlmsError::UnsupportedScheme(
                    "general-ciphering APDU".to_string(),
                ));
            }
            t if t.is_ciphered() => decipher_pdu(settings, &apdu)?.data,
            _ => return Ok(apdu),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use dlms_security::{CertificateBuilder, EccCurve};

    const GET_REQUEST: [u8; 13] = [
        0xC0, 0x01, 0xC1, 0x00, 0x08, 0x00, 0x00, 0x01, 0x00, 0x00, 0xFF, 0x02, 0x00,
    ];

    fn pair() -> (Settings, Settings) {
        let mut client = Settings::new(false);
        let mut cipher = Cipher::new(b"MMM00001").unwrap();
        cipher.set_security(Security::AuthenticationEncryption);
        cipher.set_recipient_system_title(Some(b"SRV00001")).unwrap();
        client.set_cipher(Some(cipher));

        let mut server = Settings::new(true);
        let mut cipher = Cipher::new(b"SRV00001").unwrap();
        cipher.set_security(Security::AuthenticationEncryption);
        cipher.set_recipient_system_title(Some(b"MMM00001")).unwrap();
        server.set_cipher(Some(cipher));
        (client, server)
    }

    #[test]
    fn test_service_specific_envelope() {
        let (mut client, mut server) = pair();
        let ciphered = cipher_pdu(&mut client, &GET_REQUEST).unwrap();
        assert_eq!(ciphered[0], PduType::GloGetRequest.to_u8());
        assert_eq!(ciphered[1] as usize, ciphered.len() - 2);
        assert_eq!(ciphered[2], 0x30);
        assert_eq!(&ciphered[3..7], &[0, 0, 0, 0]);
        assert_eq!(client.cipher().unwrap().invocation_counter(), 1);
        assert!(client.connection_state().contains(ConnectionState::CIPHERED));

        server.set_expected_invocation_counter(0);
        let plain = decipher_pdu(&mut server, &ciphered).unwrap();
        assert_eq!(plain.data, GET_REQUEST);
        assert_eq!(plain.invocation_counter, 0);
    }

    #[test]
    fn test_general_envelope() {
        let (mut client, mut server) = pair();
        client.negotiate_conformance(Conformance::GENERAL_PROTECTION | Conformance::GET);
        let ciphered = cipher_pdu(&mut client, &GET_REQUEST).unwrap();
        assert_eq!(ciphered[0], 0xDB);
        assert_eq!(ciphered[1], 8);
        assert_eq!(&ciphered[2..10], b"MMM00001");

        server
            .cipher_mut()
            .unwrap()
            .set_recipient_system_title(None)
            .unwrap();
        assert_eq!(decipher_pdu(&mut server, &ciphered).unwrap().data, GET_REQUEST);
    }

    #[test]
    fn test_dedicated_envelope() {
        let (mut client, mut server) = pair();
        let key = [0x55u8; 16];
        client.cipher_mut().unwrap().set_dedicated_key(Some(&key)).unwrap();
        let ciphered = cipher_pdu(&mut client, &GET_REQUEST).unwrap();
        assert_eq!(ciphered[0], PduType::DedGetRequest.to_u8());
        assert!(matches!(
            decipher_pdu(&mut server, &ciphered),
            Err(DlmsError::InvalidKey(_))
        ));
        server.cipher_mut().unwrap().set_dedicated_key(Some(&key)).unwrap();
        assert_eq!(decipher_pdu(&mut server, &ciphered).unwrap().data, GET_REQUEST);
    }

    #[test]
    fn test_replayed_envelope() {
        let (mut client, mut server) = pair();
        client.cipher_mut().unwrap().set_invocation_counter(5);
        server.set_expected_invocation_counter(1);
        let ciphered = cipher_pdu(&mut client, &GET_REQUEST).unwrap();
        assert!(decipher_pdu(&mut server, &ciphered).is_ok());
        assert_eq!(server.expected_invocation_counter(), 5);
        assert!(matches!(
            decipher_pdu(&mut server, &ciphered),
            Err(DlmsError::InvocationCounterReplay { received: 5, expected: 5 })
        ));
    }

    #[test]
    fn test_tampered_envelope() {
        let (mut client, mut server) = pair();
        let mut ciphered = cipher_pdu(&mut client, &GET_REQUEST).unwrap();
        let last = ciphered.len() - 1;
        ciphered[last] ^= 0x01;
        assert_eq!(decipher_pdu(&mut server, &ciphered), Err(DlmsError::InvalidTag));
        assert!(decipher_pdu(&mut server, &ciphered[..10]).is_err());
        assert!(matches!(
            decipher_pdu(&mut server, &GET_REQUEST),
            Err(DlmsError::Protocol(_))
        ));
    }

    fn add_signing(signer: &mut Settings, verifier: &mut Settings, subject: &str) {
        let (key, public_key) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let certificate = CertificateBuilder::new(
            subject,
            public_key.clone(),
            utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            utc.with_ymd_and_hms(2034, 1, 1, 0, 0, 0).unwrap(),
        )
        .sign(&key)
        .unwrap();
        let cipher = signer.cipher_mut().unwrap();
        cipher.set_key_pair(KeyType::DigitalSignature, key, public_key).unwrap();
        cipher.set_signing(Signing::GeneralSigning);
        verifier.cipher_mut().unwrap().add_certificate(certificate);
    }

    #[test]
    fn test_general_signing() {
        let (mut client, mut server) = pair();
        assert!(sign_pdu(&client, &GET_REQUEST).is_err());
        add_signing(&mut client, &mut server, "CN=4D4D4D3030303031");
        let signed = sign_pdu(&client, &GET_REQUEST).unwrap();
        assert_eq!(signed[0], 0xDF);
        let (apdu, signed_len) = GeneralSigning::from_bytes(&signed).unwrap();
        assert_eq!(apdu.originator_system_title, b"MMM00001");
        assert_eq!(apdu.recipient_system_title, b"SRV00001");
        assert_eq!(apdu.content, GET_REQUEST);
        assert_eq!(apdu.signature.len(), 64);
        assert_eq!(signed_len, signed.len() - 65);
        assert_eq!(verify_signed_pdu(&server, &signed).unwrap(), GET_REQUEST);

        let mut forged = signed.clone();
        forged[signed_len - 1] ^= 0x01;
        assert!(matches!(
            verify_signed_pdu(&server, &forged),
            Err(DlmsError::InvalidSignature(_))
        ));
        let (stranger, _) = pair();
        assert!(matches!(
            verify_signed_pdu(&stranger, &signed),
            Err(DlmsError::InvalidCertificate(_))
        ));
    }

    #[test]
    fn test_protect_order() {
        let (mut client, mut server) = pair();
        add_signing(&mut client, &mut server, "CN=4D4D4D3030303031");

        let protected = protect(&mut client, &GET_REQUEST).unwrap();
        assert_eq!(protected[0], 0xDF);
        assert_eq!(unprotect(&mut server, &protected).unwrap(), GET_REQUEST);

        client
            .cipher_mut()
            .unwrap()
            .set_sign_cipher_order(SignCipherOrder::SignThenCipher);
        let protected = protect(&mut client, &GET_REQUEST).unwrap();
        assert_eq!(protected[0], 0xDB);
        assert_eq!(unprotect(&mut server, &protected).unwrap(), GET_REQUEST);

        let mut plain = Settings::new(false);
        assert_eq!(protect(&mut plain, &GET_REQUEST).unwrap(), GET_REQUEST);
        assert_eq!(unprotect(&mut plain, &GET_REQUEST).unwrap(), GET_REQUEST);
    }
}
