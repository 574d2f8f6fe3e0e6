use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// Significant digits kept by division.
pub const DIVISION_PRECISION: usize = 34;

/// Largest magnitude of the decimal exponent a number may carry.
pub const MAX_EXPONENT: i64 = 6176;

/// Upper bound on the coefficient digits an exact integral power may produce.
const POW_EXACT_DIGITS: u64 = 10_000;

/// Why an arithmetic operation produced no number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    DivideByZero,
    /// The exponent left `[-MAX_EXPONENT, MAX_EXPONENT]` or a float fallback
    /// was not finite.
    OutOfRange,
}

impl fmt::Display for NumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberError::DivideByZero => write!(f, "division by zero"),
            NumberError::OutOfRange => write!(f, "number out of range"),
        }
    }
}

impl std::error::Error for NumberError {}

pub type NumberResult = std::result::Result<Number, NumberError>;

/// Arbitrary-precision decimal: `coeff * 10^exp`.
///
/// Always normalized (no trailing zeros in `coeff`, zero has `exp == 0`), so
/// structural equality is value equality: `1` and `1.00` are the same number.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Number {
    coeff: BigInt,
    exp: i64,
}

fn pow10(n: u64) -> BigInt {
    num_traits::pow(BigInt::from(10u32), n as usize)
}

fn digit_count(n: &BigInt) -> u64 {
    if n.is_zero() {
        return 1;
    }
    n.magnitude().to_str_radix(10).len() as u64
}

impl Number {
    fn normalized(mut coeff: BigInt, mut exp: i64) -> Self {
        if coeff.is_zero() {
            return Self { coeff, exp: 0 };
        }
        let ten = BigInt::from(10u32);
        loop {
            let (q, r) = coeff.div_rem(&ten);
            if !r.is_zero() {
                break;
            }
            coeff = q;
            exp += 1;
        }
        Self { coeff, exp }
    }

    /// Normalizes and rejects exponents outside the representable range.
    fn bounded(coeff: BigInt, exp: i64) -> NumberResult {
        // Normalizing only raises the exponent.
        if exp > MAX_EXPONENT {
            return Err(NumberError::OutOfRange);
        }
        let n = Self::normalized(coeff, exp);
        if n.exp.unsigned_abs() > MAX_EXPONENT as u64 {
            return Err(NumberError::OutOfRange);
        }
        Ok(n)
    }

    pub fn zero() -> Self {
        Self {
            coeff: BigInt::zero(),
            exp: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.coeff.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.coeff.is_negative()
    }

    /// True when the value has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.exp >= 0
    }

    /// Integral, non-negative and small enough to address a container.
    pub fn to_index(&self) -> Option<usize> {
        if !self.is_integer() || self.is_negative() {
            return None;
        }
        self.to_bigint_exact()?.to_usize()
    }

    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }
        self.to_bigint_exact()?.to_i64()
    }

    pub fn to_u32(&self) -> Option<u32> {
        if !self.is_integer() {
            return None;
        }
        self.to_bigint_exact()?.to_u32()
    }

    fn to_bigint_exact(&self) -> Option<BigInt> {
        if self.exp < 0 {
            return None;
        }
        // i64 exponents beyond this cannot fit any primitive anyway.
        if self.exp > 40 {
            return None;
        }
        Some(&self.coeff * pow10(self.exp as u64))
    }

    pub fn to_f64(&self) -> f64 {
        self.to_string().parse::<f64>().unwrap_or(f64::NAN)
    }

    /// Converts a finite float through its shortest round-trip decimal form.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let mut buffer = ryu::Buffer::new();
        buffer.format_finite(value).parse().ok()
    }

    /// Digits before the point minus one; orders magnitudes of non-zero values.
    fn adjusted_exponent(&self) -> i64 {
        digit_count(&self.coeff) as i64 - 1 + self.exp
    }

    fn aligned(&self, other: &Self) -> (BigInt, BigInt, i64) {
        let exp = self.exp.min(other.exp);
        let a = &self.coeff * pow10((self.exp - exp) as u64);
        let b = &other.coeff * pow10((other.exp - exp) as u64);
        (a, b, exp)
    }

    pub fn neg(&self) -> Self {
        Self {
            coeff: -&self.coeff,
            exp: self.exp,
        }
    }

    pub fn abs(&self) -> Self {
        Self {
            coeff: self.coeff.abs(),
            exp: self.exp,
        }
    }

    pub fn signum(&self) -> Self {
        match self.coeff.sign() {
            Sign::Minus => Self::from(-1i64),
            Sign::NoSign => Self::zero(),
            Sign::Plus => Self::from(1i64),
        }
    }

    pub fn add(&self, other: &Self) -> NumberResult {
        let (a, b, exp) = self.aligned(other);
        Self::bounded(a + b, exp)
    }

    pub fn sub(&self, other: &Self) -> NumberResult {
        let (a, b, exp) = self.aligned(other);
        Self::bounded(a - b, exp)
    }

    pub fn mul(&self, other: &Self) -> NumberResult {
        Self::bounded(&self.coeff * &other.coeff, self.exp + other.exp)
    }

    /// Quotient rounded half-even to [`DIVISION_PRECISION`] significant
    /// digits.
    pub fn div(&self, other: &Self) -> NumberResult {
        if other.is_zero() {
            return Err(NumberError::DivideByZero);
        }
        if self.is_zero() {
            return Ok(Self::zero());
        }
        let negative = self.coeff.is_negative() != other.coeff.is_negative();
        let num = self.coeff.abs();
        let den = other.coeff.abs();

        // One guard digit beyond the precision before rounding.
        let wanted = DIVISION_PRECISION as i64 + 1;
        let shift = (wanted + digit_count(&den) as i64 - digit_count(&num) as i64).max(0);
        let scaled = num * pow10(shift as u64);
        let (quotient, remainder) = scaled.div_rem(&den);
        let mut exp = self.exp - other.exp - shift;

        let digits = digit_count(&quotient);
        let mut coeff = quotient;
        if digits > DIVISION_PRECISION as u64 {
            let drop = digits - DIVISION_PRECISION as u64;
            let divisor = pow10(drop);
            let (kept, dropped) = coeff.div_rem(&divisor);
            let twice = &dropped * 2u32;
            let round_up = match twice.cmp(&divisor) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => !remainder.is_zero() || kept.is_odd(),
            };
            coeff = if round_up { kept + 1u32 } else { kept };
            exp += drop as i64;
        }
        if negative {
            coeff = -coeff;
        }
        Self::bounded(coeff, exp)
    }

    /// Truncated remainder carrying the sign of the dividend.
    pub fn rem(&self, other: &Self) -> NumberResult {
        if other.is_zero() {
            return Err(NumberError::DivideByZero);
        }
        let (a, b, exp) = self.aligned(other);
        Self::bounded(a % b, exp)
    }

    /// Exact square-and-multiply for non-negative integral exponents whose
    /// result stays within [`POW_EXACT_DIGITS`], `f64` power otherwise.
    pub fn pow(&self, exponent: &Self) -> NumberResult {
        if exponent.is_integer() && !exponent.is_negative() {
            if exponent.is_zero() {
                return Ok(Self::from(1i64));
            }
            if self.is_zero() {
                return Ok(Self::zero());
            }
            if self.exp == 0 && self.coeff.magnitude().is_one() {
                // Exponents too large for an exact bigint are multiples of ten.
                let odd = exponent.to_bigint_exact().is_some_and(|e| e.is_odd());
                return Ok(if self.is_negative() && odd { self.clone() } else { Self::from(1i64) });
            }
            if let Some(n) = exponent.to_bigint_exact().and_then(|e| e.to_u64()) {
                let digits_fit = digit_count(&self.coeff)
                    .checked_mul(n)
                    .is_some_and(|d| d <= POW_EXACT_DIGITS);
                let exp_fits = self
                    .exp
                    .unsigned_abs()
                    .checked_mul(n)
                    .is_some_and(|e| e <= MAX_EXPONENT as u64);
                if digits_fit && exp_fits {
                    return self.pow_exact(n);
                }
            }
        }
        Self::from_f64(self.to_f64().powf(exponent.to_f64())).ok_or(NumberError::OutOfRange)
    }

    fn pow_exact(&self, mut n: u64) -> NumberResult {
        let mut base = self.clone();
        let mut result = Self::from(1i64);
        while n > 0 {
            if n & 1 == 1 {
                result = result.mul(&base)?;
            }
            n >>= 1;
            if n > 0 {
                base = base.mul(&base)?;
            }
        }
        Ok(result)
    }

    /// `self + delta` for an integral value.
    fn step(&self, delta: i64) -> Self {
        Self::normalized(&self.coeff * pow10(self.exp.max(0) as u64) + delta, 0)
    }

    pub fn trunc(&self) -> Self {
        if self.exp >= 0 {
            return self.clone();
        }
        // BigInt division truncates toward zero.
        Self::normalized(&self.coeff / pow10((-self.exp) as u64), 0)
    }

    pub fn floor(&self) -> Self {
        let t = self.trunc();
        if self.is_negative() && &t != self {
            t.step(-1)
        } else {
            t
        }
    }

    pub fn ceil(&self) -> Self {
        let t = self.trunc();
        if !self.is_negative() && &t != self {
            t.step(1)
        } else {
            t
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        let (sa, sb) = (self.coeff.sign(), other.coeff.sign());
        if sa != sb {
            return sa.cmp(&sb);
        }
        if sa == Sign::NoSign {
            return Ordering::Equal;
        }
        let magnitude = match self.adjusted_exponent().cmp(&other.adjusted_exponent()) {
            Ordering::Equal => {
                let (a, b, _) = self.abs().aligned(&other.abs());
                a.cmp(&b)
            }
            ord => ord,
        };
        if sa == Sign::Minus { magnitude.reverse() } else { magnitude }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

macro_rules! number_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Number {
                #[inline]
                fn from(v: $t) -> Self {
                    Number::normalized(BigInt::from(v), 0)
                }
            }
        )*
    };
}

number_from_int!(i32, i64, u32, u64, usize);

impl FromStr for Number {
    type Err = anyhow::Error;

    /// Accepts `[+-]digits[.digits][(e|E)[+-]digits]`.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let (mantissa, exponent) = match text.find(['e', 'E']) {
            Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
            None => (text, None),
        };
        let (negative, unsigned) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };
        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            bail!("invalid number literal '{}'", s);
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            bail!("invalid number literal '{}'", s);
        }
        let digits = format!("{}{}", int_part, frac_part);
        let mut coeff = BigInt::parse_bytes(digits.as_bytes(), 10)
            .ok_or_else(|| anyhow!("invalid number literal '{}'", s))?;
        if negative {
            coeff = -coeff;
        }
        let mut exp = -i64::try_from(frac_part.len()).map_err(|_| anyhow!("number literal too long '{}'", s))?;
        if let Some(e) = exponent {
            let e: i64 = e.parse().map_err(|_| anyhow!("invalid number exponent in '{}'", s))?;
            exp = exp
                .checked_add(e)
                .ok_or_else(|| anyhow!("number exponent out of range in '{}'", s))?;
        }
        Self::bounded(coeff, exp).map_err(|_| anyhow!("number exponent out of range in '{}'", s))
    }
}

impl fmt::Display for Number {
    /// Plain notation, never scientific; no trailing fractional zeros.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.coeff.is_negative() { "-" } else { "" };
        let digits = self.coeff.magnitude().to_str_radix(10);
        if self.exp >= 0 {
            write!(f, "{}{}{}", sign, digits, "0".repeat(self.exp as usize))
        } else {
            let frac_len = (-self.exp) as usize;
            if digits.len() > frac_len {
                let (int_part, frac_part) = digits.split_at(digits.len() - frac_len);
                write!(f, "{}{}.{}", sign, int_part, frac_part)
            } else {
                write!(f, "{}0.{}{}", sign, "0".repeat(frac_len - digits.len()), digits)
            }
        }
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Number({})", self)
    }
}
