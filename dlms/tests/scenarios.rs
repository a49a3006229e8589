use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use dlms::helpers::{hex_to_bytes, to_hex};
use dlms::security::encryption::gmac_tag;
use dlms::security::{
    AesGcmParameter, Authentication, Cipher, Pkcs8, Security, SecuritySuite, key_wrap, secure,
    verify,
};
use dlms::session::hdlc::{increase_receiver_sequence, increase_send_sequence};
use dlms::session::{Settings, protect, unprotect};
use dlms::{CosemDateTime, DateTimeKind};

#[test]
fn test_gmac_authentication_tag() {
    let p = AesGcmParameter::new(
        Security::Authentication,
        SecuritySuite::Suite0,
        0x0123_4567,
        &hex_to_bytes("4D 4D 4D 00 00 BC 61 4E").unwrap(),
        &hex_to_bytes("000102030405060708090A0B0C0D0E0F").unwrap(),
        &hex_to_bytes("D0D1D2D3D4D5D6D7D8D9DADBDCDDDEDF").unwrap(),
    );
    let plaintext = hex_to_bytes("C0 01 00 00 08 00 00 01 00 00 FF 02 00").unwrap();
    let tag = gmac_tag(&p, &plaintext).unwrap();
    assert_eq!(to_hex(&tag, false), "06725D910F9221D263877516");
}

#[test]
fn test_aes_key_wrap() {
    let kek = hex_to_bytes("000102030405060708090A0B0C0D0E0F").unwrap();
    let key = hex_to_bytes("00112233445566778899AABBCCDDEEFF").unwrap();
    let wrapped = key_wrap::wrap(&kek, &key).unwrap();
    assert_eq!(
        to_hex(&wrapped, false),
        "1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5"
    );
    assert_eq!(key_wrap::unwrap(&kek, &wrapped).unwrap(), key);
}

#[test]
fn test_hex_normalization() {
    let bytes = hex_to_bytes("7E-A007:03 21 93 0F 01 7E").unwrap();
    assert_eq!(bytes, vec![0x7E, 0xA0, 0x07, 0x03, 0x21, 0x93, 0x0F, 0x01, 0x7E]);
    assert_eq!(to_hex(&bytes, true), "7E A0 07 03 21 93 0F 01 7E");
}

#[test]
fn test_finnish_date_time() {
    let dt = CosemDateTime::parse("31.12.2024 15.04.05", "fi-FI").unwrap();
    let expected = NaiveDate::from_ymd_opt(2024, 12, 31)
        .unwrap()
        .and_hms_opt(15, 4, 5)
        .unwrap();
    assert_eq!(dt.naive_local(), expected);
    assert_eq!(
        dt.format(DateTimeKind::DateTime, "fi-FI").unwrap(),
        "31.12.2024 15.04.05"
    );
}

#[test]
fn test_pkcs8_round_trip() {
    let der = STANDARD
        .decode(
            "MIGHAgEAMBMGByqGSM49AgEGCCqGSM49AwEHBG0wawIBAQQgya+p2EW6dRZrXCFXZ7HWk05Qw9s26JsSe4piKxIPZyGhRANCAARg/tS6JVqdMclh63TGNW1owEm4kjth+mzmaWIuYPKftnkD/hAIuLyZpBrp6VYovGTy8bIMLX6fUXejwpTURiKZ",
        )
        .unwrap();
    let pkcs8 = Pkcs8::from_der(&der).unwrap();
    assert_eq!(pkcs8.private_key().raw_value().len(), 32);
    assert_eq!(pkcs8.public_key().unwrap().to_sec1().len(), 65);
    assert_eq!(pkcs8.to_der().unwrap(), der);
}

#[test]
fn test_hdlc_frame_check() {
    let mut settings = Settings::new(false);
    assert_eq!((settings.sender_frame(), settings.receiver_frame()), (0xFE, 0x0E));
    assert!(settings.check_frame(0x93));
    let expected = increase_receiver_sequence(increase_send_sequence(0x0E));
    assert!(settings.check_frame(expected));
    assert_eq!(settings.receiver_frame(), expected);
    assert!(!settings.check_frame(expected));
}

#[test]
fn test_gmac_association_and_ciphered_exchange() {
    let mut client = Settings::new(false);
    let mut server = Settings::new(true);
    client.set_authentication(Authentication::HighGmac);
    server.set_authentication(Authentication::HighGmac);

    let mut cipher = Cipher::new(b"MMM00001").unwrap();
    cipher.set_security(Security::AuthenticationEncryption);
    cipher.set_recipient_system_title(Some(b"SRV00001")).unwrap();
    client.set_cipher(Some(cipher));
    let mut cipher = Cipher::new(b"SRV00001").unwrap();
    cipher.set_security(Security::AuthenticationEncryption);
    cipher.set_recipient_system_title(Some(b"MMM00001")).unwrap();
    server.set_cipher(Some(cipher));

    // The server challenges the client, the client answers with GMAC.
    let stoc = server.own_challenge().unwrap();
    assert!((8..=64).contains(&stoc.len()));
    let client_cipher = client.cipher().unwrap();
    let reply = secure(
        client_cipher,
        Authentication::HighGmac,
        client_cipher.invocation_counter(),
        &stoc,
        &[],
    )
    .unwrap();
    assert!(verify(server.cipher().unwrap(), Authentication::HighGmac, &stoc, &[], &reply).unwrap());

    client.cipher_mut().unwrap().set_invocation_counter(1);
    server.set_expected_invocation_counter(0);
    let request = hex_to_bytes("C0 01 C1 00 08 00 00 01 00 00 FF 02 00").unwrap();
    let protected = protect(&mut client, &request).unwrap();
    assert_eq!(protected[0], 0xC8);
    assert_eq!(unprotect(&mut server, &protected).unwrap(), request);

    let response = hex_to_bytes("C4 01 C1 00 09 0C 07 E8 0C 1F 02 0F 04 05 00 80 00 00").unwrap();
    let protected = protect(&mut server, &response).unwrap();
    assert_eq!(protected[0], 0xCC);
    assert_eq!(unprotect(&mut client, &protected).unwrap(), response);
}
