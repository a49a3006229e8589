//! Object identifiers and the dictionaries used by certificates

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ASN.1 object identifier as a list of arcs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Oid(Vec<u64>);

impl Oid {
    pub fn new(arcs: Vec<u64>) -> DlmsResult<Self> {
        if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
            return Err(DlmsError::InvalidData(format!("invalid OID arcs {:?}", arcs)));
        }
        Ok(Self(arcs))
    }

    pub fn arcs(&self) -> &[u64] {
        &self.0
    }

    /// Content octets: base-128 groups, first two arcs folded as `first*40 + second`.
    pub fn to_der(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let first = self.0[0] * 40 + self.0[1];
        for arc in std::iter::once(first).chain(self.0[2..].iter().copied()) {
            let mut groups = vec![(arc & 0x7F) as u8];
            let mut rest = arc >> 7;
            while rest != 0 {
                groups.push(0x80 | (rest & 0x7F) as u8);
                rest >>= 7;
            }
            out.extend(groups.iter().rev());
        }
        out
    }

    /// Decode content octets; `offset` is used for error reporting.
    pub fn from_der(bytes: &[u8], offset: usize) -> DlmsResult<Self> {
        let mut values = Vec::new();
        let mut acc: u64 = 0;
        for (i, b) in bytes.iter().enumerate() {
            if acc > (u64::MAX >> 7) {
                return Err(DlmsError::malformed(offset + i, "OID arc overflows"));
            }
            acc = (acc << 7) | (b & 0x7F) as u64;
            if b & 0x80 == 0 {
                values.push(acc);
                acc = 0;
            }
        }
        if bytes.is_empty() || bytes[bytes.len() - 1] & 0x80 != 0 {
            return Err(DlmsError::malformed(offset, "truncated OID"));
        }
        let first = values[0];
        let (a, b) = match first {
            0..=39 => (0, first),
            40..=79 => (1, first - 40),
            _ => (2, first - 80),
        };
        let mut arcs = vec![a, b];
        arcs.extend_from_slice(&values[1..]);
        Ok(Self(arcs))
    }
}

impl FromStr for Oid {
    type Err = DlmsError;

    fn from_str(s: &str) -> DlmsResult<Self> {
        let arcs = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DlmsError::InvalidData(format!("invalid OID '{}'", s)))?;
        Self::new(arcs)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

macro_rules! oid_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident = $oid:literal, $text:literal;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            const TABLE: &'static [($name, &'static str, &'static str)] = &[
                $(($name::$variant, $oid, $text)),*
            ];

            /// Dotted form
            pub fn dotted(self) -> &'static str {
                Self::TABLE.iter().find(|e| e.0 == self).map(|e| e.1).unwrap_or_default()
            }

            pub fn name(self) -> &'static str {
                Self::TABLE.iter().find(|e| e.0 == self).map(|e| e.2).unwrap_or_default()
            }

            pub fn oid(self) -> Oid {
                // Table entries are well formed literals.
                Oid(self.dotted().split('.').filter_map(|p| p.parse().ok()).collect())
            }

            pub fn from_dotted(dotted: &str) -> Option<Self> {
                Self::TABLE.iter().find(|e| e.1 == dotted).map(|e| e.0)
            }

            pub fn from_oid(oid: &Oid) -> Option<Self> {
                Self::from_dotted(&oid.to_string())
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::TABLE
                    .iter()
                    .find(|e| e.2.eq_ignore_ascii_case(name))
                    .map(|e| e.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

oid_table! {
    /// Attribute types of an X.500 distinguished name
    X509Name {
        CommonName = "2.5.4.3", "CN";
        Surname = "2.5.4.4", "SN";
        SerialNumber = "2.5.4.5", "SERIALNUMBER";
        Country = "2.5.4.6", "C";
        Locality = "2.5.4.7", "L";
        State = "2.5.4.8", "ST";
        Street = "2.5.4.9", "STREET";
        Organization = "2.5.4.10", "O";
        OrganizationalUnit = "2.5.4.11", "OU";
        Title = "2.5.4.12", "T";
        GivenName = "2.5.4.42", "GIVENNAME";
        Initials = "2.5.4.43", "INITIALS";
        Generation = "2.5.4.44", "GENERATION";
        DnQualifier = "2.5.4.46", "DN";
        Pseudonym = "2.5.4.65", "PSEUDONYM";
        EmailAddress = "1.2.840.113549.1.9.1", "E";
        DomainComponent = "0.9.2342.19200300.100.1.25", "DC";
        UserId = "0.9.2342.19200300.100.1.1", "UID";
    }
}

oid_table! {
    /// ANSI X9.62 elliptic curve identifiers
    X9ObjectIdentifier {
        IdECPublicKey = "1.2.840.10045.2.1", "ecPublicKey";
        Prime256v1 = "1.2.840.10045.3.1.7", "prime256v1";
        Secp384r1 = "1.3.132.0.34", "secp384r1";
        EcdsaWithSha256 = "1.2.840.10045.4.3.2", "ecdsa-with-SHA256";
        EcdsaWithSha384 = "1.2.840.10045.4.3.3", "ecdsa-with-SHA384";
    }
}

oid_table! {
    PkcsObjectIdentifier {
        RsaEncryption = "1.2.840.113549.1.1.1", "rsaEncryption";
        Sha256WithRsaEncryption = "1.2.840.113549.1.1.11", "sha256WithRSAEncryption";
        Pkcs9EmailAddress = "1.2.840.113549.1.9.1", "emailAddress";
        ChallengePassword = "1.2.840.113549.1.9.7", "challengePassword";
        ExtensionRequest = "1.2.840.113549.1.9.14", "extensionRequest";
    }
}

oid_table! {
    HashAlgorithm {
        Sha1 = "1.3.14.3.2.26", "SHA1";
        Sha256 = "2.16.840.1.101.3.4.2.1", "SHA256";
        Sha384 = "2.16.840.1.101.3.4.2.2", "SHA384";
        Sha512 = "2.16.840.1.101.3.4.2.3", "SHA512";
    }
}

oid_table! {
    /// Certificate extensions
    X509Extension {
        SubjectKeyIdentifier = "2.5.29.14", "subjectKeyIdentifier";
        KeyUsage = "2.5.29.15", "keyUsage";
        SubjectAlternativeName = "2.5.29.17", "subjectAltName";
        BasicConstraints = "2.5.29.19", "basicConstraints";
        AuthorityKeyIdentifier = "2.5.29.35", "authorityKeyIdentifier";
        ExtendedKeyUsage = "2.5.29.37", "extKeyUsage";
    }
}

oid_table! {
    /// Extended key usage purposes
    KeyPurpose {
        ServerAuth = "1.3.6.1.5.5.7.3.1", "serverAuth";
        ClientAuth = "1.3.6.1.5.5.7.3.2", "clientAuth";
    }
}

impl X509Name {
    /// Universal string tag used for values of this attribute
    pub fn string_tag(self) -> u8 {
        use crate::ber::types::tags;
        match self {
            X509Name::Country | X509Name::SerialNumber | X509Name::DnQualifier => {
                tags::PRINTABLE_STRING
            }
            X509Name::EmailAddress | X509Name::DomainComponent => tags::IA5_STRING,
            _ => tags::UTF8_STRING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_der() {
        let oid: Oid = "1.2.840.10045.2.1".parse().unwrap();
        assert_eq!(oid.to_der(), vec![0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x02, 0x01]);
        assert_eq!(Oid::from_der(&oid.to_der(), 0).unwrap(), oid);
        let oid: Oid = "2.5.4.3".parse().unwrap();
        assert_eq!(oid.to_der(), vec![0x55, 0x04, 0x03]);
        assert_eq!(oid.to_string(), "2.5.4.3");
    }

    #[test]
    fn test_oid_errors() {
        assert!("1".parse::<Oid>().is_err());
        assert!("1.x".parse::<Oid>().is_err());
        assert!(Oid::from_der(&[0x2A, 0x86], 3).is_err());
        assert!(Oid::from_der(&[], 0).is_err());
    }

    #[test]
    fn test_dictionaries() {
        assert_eq!(X509Name::from_name("cn"), Some(X509Name::CommonName));
        assert_eq!(X509Name::CommonName.dotted(), "2.5.4.3");
        assert_eq!(
            X9ObjectIdentifier::from_dotted("1.3.132.0.34"),
            Some(X9ObjectIdentifier::Secp384r1)
        );
        assert_eq!(
            X509Extension::KeyUsage.oid(),
            "2.5.29.15".parse::<Oid>().unwrap()
        );
        assert_eq!(HashAlgorithm::Sha256.to_string(), "SHA256");
        assert_eq!(X509Name::from_dotted("9.9.9"), None);
    }
}
