#![forbid(unsafe_code)]

//! Bit-level view of single-precision values.
//!
//! Every f32 is reasoned about both as a real number and as a raw bit
//! pattern. The ordered-step line maps bit patterns onto a monotone integer
//! axis where `-0.0` and `+0.0` share position 0, so distances measured in
//! representable steps stay continuous through zero.

pub const SIGN_MASK: u32 = 0x8000_0000;
pub const EXPONENT_MASK: u32 = 0x7f80_0000;
pub const MANTISSA_MASK: u32 = 0x007f_ffff;

/// Ordered-step position of `+inf`; `-inf` sits at the negation.
pub const INFINITY_STEP: i64 = 0x7f80_0000;

/// Position of `x` on the ordered-step line, or `None` for NaN.
#[must_use]
pub fn ordered_step(x: f32) -> Option<i64> {
    if x.is_nan() {
        return None;
    }
    let bits = x.to_bits();
    let magnitude = i64::from(bits & !SIGN_MASK);
    if bits & SIGN_MASK == 0 {
        Some(magnitude)
    } else {
        Some(-magnitude)
    }
}

/// Inverse of [`ordered_step`]. Position 0 yields `+0.0`; positions beyond
/// the infinities saturate.
#[must_use]
pub fn from_ordered_step(step: i64) -> f32 {
    let clamped = step.clamp(-INFINITY_STEP, INFINITY_STEP);
    let magnitude = u32::try_from(clamped.unsigned_abs()).unwrap_or(EXPONENT_MASK);
    if clamped < 0 {
        f32::from_bits(magnitude | SIGN_MASK)
    } else {
        f32::from_bits(magnitude)
    }
}

/// Moves `x` by `steps` representable values, saturating at the infinities.
/// NaN is returned unchanged.
#[must_use]
pub fn step_by(x: f32, steps: i64) -> f32 {
    if steps == 0 {
        return x;
    }
    match ordered_step(x) {
        Some(position) => from_ordered_step(position.saturating_add(steps)),
        None => x,
    }
}

#[must_use]
pub fn next_up(x: f32) -> f32 {
    step_by(x, 1)
}

#[must_use]
pub fn next_down(x: f32) -> f32 {
    step_by(x, -1)
}

/// Number of representable steps between `a` and `b`. Signed zeros are zero
/// steps apart. `None` if either value is NaN.
#[must_use]
pub fn ulp_distance(a: f32, b: f32) -> Option<u64> {
    let lhs = ordered_step(a)?;
    let rhs = ordered_step(b)?;
    Some(lhs.abs_diff(rhs))
}

/// Bit equality with `+0.0` and `-0.0` treated as the same value.
#[must_use]
pub fn bits_equal_ignoring_zero_sign(a: f32, b: f32) -> bool {
    a.to_bits() == b.to_bits() || (a == 0.0 && b == 0.0)
}

/// Replaces a subnormal by the zero of the same sign.
#[must_use]
pub fn flush_subnormal(x: f32) -> f32 {
    if x.is_subnormal() {
        0.0_f32.copysign(x)
    } else {
        x
    }
}

/// The f32 values immediately at or around `reference`.
///
/// Returns `(lo, hi)` with `lo <= reference <= hi`; both are equal when the
/// reference is exactly representable. References past `f32::MAX` bracket
/// against the matching infinity. NaN yields `(NaN, NaN)`.
#[must_use]
pub fn bracket_f64(reference: f64) -> (f32, f32) {
    #[allow(clippy::cast_possible_truncation)]
    let nearest = reference as f32;
    if reference.is_nan() {
        return (nearest, nearest);
    }
    let widened = f64::from(nearest);
    if widened == reference {
        (nearest, nearest)
    } else if widened < reference {
        (nearest, next_up(nearest))
    } else {
        (next_down(nearest), nearest)
    }
}

/// Round-to-nearest narrowing that keeps the f64 sign of zero and NaN sign.
#[must_use]
pub fn narrow_f64(reference: f64) -> f32 {
    #[allow(clippy::cast_possible_truncation)]
    let narrowed = reference as f32;
    narrowed
}

/// Parses fixture literals: decimal numbers, `nan`, `inf`, `-inf`, `-0`,
/// or raw bit patterns written as `0x7fc00001`.
#[must_use]
pub fn parse_f32_literal(raw: &str) -> Option<f32> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if let Some(hex) = lowered.strip_prefix("0x") {
        return u32::from_str_radix(hex, 16).ok().map(f32::from_bits);
    }
    match lowered.as_str() {
        "nan" | "+nan" => Some(f32::NAN),
        "-nan" => Some(-f32::NAN),
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f32::INFINITY),
        "-inf" | "-infinity" => Some(f32::NEG_INFINITY),
        _ => trimmed.parse::<f32>().ok(),
    }
}

/// Decimal, raw-bit and hex-float renderings used in failure diagnostics.
pub trait FloatDiagnostic: Copy {
    fn decimal(self) -> String;
    fn hex_bits(self) -> String;
    fn hex_float(self) -> String;

    /// `decimal {bits} hexfloat`, the layout used for every value printed in
    /// a lane diagnostic.
    fn describe(self) -> String {
        format!(
            "{:>16} {{{}}} {:>16}",
            self.decimal(),
            self.hex_bits(),
            self.hex_float()
        )
    }
}

impl FloatDiagnostic for f32 {
    fn decimal(self) -> String {
        format!("{self:.8e}")
    }

    fn hex_bits(self) -> String {
        format!("{:08x}", self.to_bits())
    }

    fn hex_float(self) -> String {
        render_hex_float(u64::from(self.to_bits()), 8, 23)
    }
}

impl FloatDiagnostic for f64 {
    fn decimal(self) -> String {
        format!("{self:.17e}")
    }

    fn hex_bits(self) -> String {
        format!("{:016x}", self.to_bits())
    }

    fn hex_float(self) -> String {
        render_hex_float(self.to_bits(), 11, 52)
    }
}

fn render_hex_float(bits: u64, exponent_bits: u32, mantissa_bits: u32) -> String {
    let sign = if bits >> (exponent_bits + mantissa_bits) & 1 == 1 {
        "-"
    } else {
        ""
    };
    let exponent_max = (1_u64 << exponent_bits) - 1;
    let exponent = (bits >> mantissa_bits) & exponent_max;
    let mantissa = bits & ((1_u64 << mantissa_bits) - 1);
    let bias = i64::try_from(exponent_max >> 1).unwrap_or(i64::MAX);

    if exponent == exponent_max {
        return if mantissa == 0 {
            format!("{sign}Infinity")
        } else {
            "NaN".to_string()
        };
    }
    if exponent == 0 && mantissa == 0 {
        return format!("{sign}0x0.0p0");
    }

    // Pad the fraction to whole hex digits.
    let pad = (4 - mantissa_bits % 4) % 4;
    let digits = ((mantissa_bits + pad) / 4) as usize;
    let fraction = format!("{:0digits$x}", mantissa << pad);
    let fraction = match fraction.trim_end_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };

    if exponent == 0 {
        format!("{sign}0x0.{fraction}p{}", 1 - bias)
    } else {
        let unbiased = i64::try_from(exponent).unwrap_or(0) - bias;
        format!("{sign}0x1.{fraction}p{unbiased}")
    }
}
