//! Prime field elliptic curve arithmetic for P-256 and P-384
//!
//! Points are kept in Jacobian coordinates while multiplying and converted
//! to affine coordinates once at the end.

use crate::error::{DlmsError, DlmsResult};
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Supported NIST curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EccCurve {
    P256,
    P384,
}

impl EccCurve {
    /// Length of a coordinate or scalar in bytes
    pub fn size(&self) -> usize {
        match self {
            EccCurve::P256 => 32,
            EccCurve::P384 => 48,
        }
    }

    /// Curve arithmetic for this curve.
    pub fn ecc(&self) -> &'static Ecc {
        match self {
            EccCurve::P256 => &P256,
            EccCurve::P384 => &P384,
        }
    }

    /// Curve whose coordinates are `size` bytes long.
    pub fn from_size(size: usize) -> DlmsResult<Self> {
        match size {
            32 => Ok(EccCurve::P256),
            48 => Ok(EccCurve::P384),
            n => Err(DlmsError::UnsupportedScheme(format!(
                "no curve with {} byte coordinates",
                n
            ))),
        }
    }
}

/// Affine point; the point at infinity is not representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EccPoint {
    pub x: BigUint,
    pub y: BigUint,
}

impl EccPoint {
    pub fn new(x: BigUint, y: BigUint) -> Self {
        Self { x, y }
    }
}

/// Jacobian point, `z == 0` is infinity.
#[derive(Debug, Clone)]
struct Jacobian {
    x: BigUint,
    y: BigUint,
    z: BigUint,
}

impl Jacobian {
    fn infinity() -> Self {
        Self {
            x: BigUint::one(),
            y: BigUint::one(),
            z: BigUint::zero(),
        }
    }

    fn from_affine(p: &EccPoint) -> Self {
        Self {
            x: p.x.clone(),
            y: p.y.clone(),
            z: BigUint::one(),
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }
}

/// Domain parameters and point operations of one curve
#[derive(Debug)]
pub struct Ecc {
    pub curve: EccCurve,
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
    /// Order of the base point
    pub n: BigUint,
    pub g: EccPoint,
}

fn big(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).unwrap_or_default()
}

static P256: Lazy<Ecc> = Lazy::new(|| {
    let p = big("FFFFFFFF00000001000000000000000000000000FFFFFFFFFFFFFFFFFFFFFFFF");
    Ecc {
        curve: EccCurve::P256,
        a: &p - 3u32,
        b: big("5AC635D8AA3A93E7B3EBBD55769886BC651D06B0CC53B0F63BCE3C3E27D2604B"),
        n: big("FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551"),
        g: EccPoint::new(
            big("6B17D1F2E12C4247F8BCE6E563A440F277037D812DEB33A0F4A13945D898C296"),
            big("4FE342E2FE1A7F9B8EE7EB4A7C0F9E162BCE33576B315ECECBB6406837BF51F5"),
        ),
        p,
    }
});

static P384: Lazy<Ecc> = Lazy::new(|| {
    let p = big(
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFFFF0000000000000000FFFFFFFF",
    );
    Ecc {
        curve: EccCurve::P384,
        a: &p - 3u32,
        b: big(
            "B3312FA7E23EE7E4988E056BE3F82D19181D9C6EFE8141120314088F5013875AC656398D8A2ED19D2A85C8EDD3EC2AEF",
        ),
        n: big(
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFC7634D81F4372DDF581A0DB248B0A77AECEC196ACCC52973",
        ),
        g: EccPoint::new(
            big(
                "AA87CA22BE8B05378EB1C71EF320AD746E1D3B628BA79B9859F741E082542A385502F25DBF55296C3A545E3872760AB7",
            ),
            big(
                "3617DE4A96262C6F5D9E98BF9292DC29F8F41DBD289A147CE9DA3113B5F0B8C00A60B1CE1D7E819D7A431D7C90EA0E5F",
            ),
        ),
        p,
    }
});

impl Ecc {
    pub fn size(&self) -> usize {
        self.curve.size()
    }

    fn add_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.p
    }

    fn sub_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + &self.p - (b % &self.p)) % &self.p
    }

    fn mul_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.p
    }

    /// `y^2 == x^3 + ax + b (mod p)` with both coordinates below `p`.
    pub fn is_on_curve(&self, point: &EccPoint) -> bool {
        if point.x >= self.p || point.y >= self.p {
            return false;
        }
        let lhs = self.mul_mod(&point.y, &point.y);
        let x3 = self.mul_mod(&self.mul_mod(&point.x, &point.x), &point.x);
        let rhs = self.add_mod(&self.add_mod(&x3, &self.mul_mod(&self.a, &point.x)), &self.b);
        lhs == rhs
    }

    /// Recover `y` from `x` and its parity (SEC1 compressed form).
    pub fn decompress(&self, x: &BigUint, y_odd: bool) -> DlmsResult<EccPoint> {
        let x3 = self.mul_mod(&self.mul_mod(x, x), x);
        let rhs = self.add_mod(&self.add_mod(&x3, &self.mul_mod(&self.a, x)), &self.b);
        // Both primes are 3 mod 4.
        let exp = (&self.p + 1u32) >> 2;
        let mut y = rhs.modpow(&exp, &self.p);
        if y.is_odd() != y_odd {
            y = &self.p - &y;
        }
        let point = EccPoint::new(x.clone(), y);
        if !self.is_on_curve(&point) {
            return Err(DlmsError::InvalidKey("x is not on the curve".to_string()));
        }
        Ok(point)
    }

    fn double(&self, p: &Jacobian) -> Jacobian {
        if p.is_infinity() || p.y.is_zero() {
            return Jacobian::infinity();
        }
        let y2 = self.mul_mod(&p.y, &p.y);
        let s = self.mul_mod(&(&p.x * 4u32), &y2);
        let z2 = self.mul_mod(&p.z, &p.z);
        let z4 = self.mul_mod(&z2, &z2);
        let m = self.add_mod(
            &self.mul_mod(&(&p.x * 3u32), &p.x),
            &self.mul_mod(&self.a, &z4),
        );
        let x = self.sub_mod(&self.mul_mod(&m, &m), &(&s * 2u32));
        let y4 = self.mul_mod(&y2, &y2);
        let y = self.sub_mod(&self.mul_mod(&m, &self.sub_mod(&s, &x)), &(&y4 * 8u32));
        let z = self.mul_mod(&(&p.y * 2u32), &p.z);
        Jacobian { x, y, z }
    }

    fn add(&self, p: &Jacobian, q: &Jacobian) -> Jacobian {
        if p.is_infinity() {
            return q.clone();
        }
        if q.is_infinity() {
            return p.clone();
        }
        let pz2 = self.mul_mod(&p.z, &p.z);
        let qz2 = self.mul_mod(&q.z, &q.z);
        let u1 = self.mul_mod(&p.x, &qz2);
        let u2 = self.mul_mod(&q.x, &pz2);
        let s1 = self.mul_mod(&p.y, &self.mul_mod(&qz2, &q.z));
        let s2 = self.mul_mod(&q.y, &self.mul_mod(&pz2, &p.z));
        if u1 == u2 {
            return if s1 == s2 {
                self.double(p)
            } else {
                Jacobian::infinity()
            };
        }
        let h = self.sub_mod(&u2, &u1);
        let r = self.sub_mod(&s2, &s1);
        let h2 = self.mul_mod(&h, &h);
        let h3 = self.mul_mod(&h2, &h);
        let u1h2 = self.mul_mod(&u1, &h2);
        let x = self.sub_mod(
            &self.sub_mod(&self.mul_mod(&r, &r), &h3),
            &(&u1h2 * 2u32),
        );
        let y = self.sub_mod(
            &self.mul_mod(&r, &self.sub_mod(&u1h2, &x)),
            &self.mul_mod(&s1, &h3),
        );
        let z = self.mul_mod(&h, &self.mul_mod(&p.z, &q.z));
        Jacobian { x, y, z }
    }

    fn to_affine(&self, p: &Jacobian) -> DlmsResult<EccPoint> {
        if p.is_infinity() {
            return Err(DlmsError::Security("point at infinity".to_string()));
        }
        let z_inv = p
            .z
            .modinv(&self.p)
            .ok_or_else(|| DlmsError::Security("non-invertible z coordinate".to_string()))?;
        let z_inv2 = self.mul_mod(&z_inv, &z_inv);
        Ok(EccPoint::new(
            self.mul_mod(&p.x, &z_inv2),
            self.mul_mod(&p.y, &self.mul_mod(&z_inv2, &z_inv)),
        ))
    }

    /// Affine addition of two points.
    pub fn add_points(&self, p: &EccPoint, q: &EccPoint) -> DlmsResult<EccPoint> {
        self.to_affine(&self.add(&Jacobian::from_affine(p), &Jacobian::from_affine(q)))
    }

    /// `k * point` with a Montgomery ladder.
    pub fn multiply(&self, k: &BigUint, point: &EccPoint) -> DlmsResult<EccPoint> {
        let mut r0 = Jacobian::infinity();
        let mut r1 = Jacobian::from_affine(point);
        for i in (0..k.bits()).rev() {
            if k.bit(i) {
                r0 = self.add(&r0, &r1);
                r1 = self.double(&r1);
            } else {
                r1 = self.add(&r0, &r1);
                r0 = self.double(&r0);
            }
        }
        self.to_affine(&r0)
    }

    /// `k * G`
    pub fn multiply_base(&self, k: &BigUint) -> DlmsResult<EccPoint> {
        self.multiply(k, &self.g)
    }

    /// `u1 * p + u2 * q` in one pass (Shamir's trick).
    pub fn shamir(
        &self,
        u1: &BigUint,
        p: &EccPoint,
        u2: &BigUint,
        q: &EccPoint,
    ) -> DlmsResult<EccPoint> {
        let jp = Jacobian::from_affine(p);
        let jq = Jacobian::from_affine(q);
        let jpq = self.add(&jp, &jq);
        let mut r = Jacobian::infinity();
        for i in (0..u1.bits().max(u2.bits())).rev() {
            r = self.double(&r);
            match (u1.bit(i), u2.bit(i)) {
                (true, true) => r = self.add(&r, &jpq),
                (true, false) => r = self.add(&r, &jp),
                (false, true) => r = self.add(&r, &jq),
                (false, false) => {}
            }
        }
        self.to_affine(&r)
    }

    /// Big endian, left padded to the curve size.
    pub fn to_fixed_bytes(&self, value: &BigUint) -> Vec<u8> {
        let bytes = value.to_bytes_be();
        let size = self.size();
        if bytes.len() >= size {
            return bytes[bytes.len() - size..].to_vec();
        }
        let mut out = vec![0u8; size - bytes.len()];
        out.extend_from_slice(&bytes);
        out
    }
}
