//! fixed-width renderings of quantities.
//!
//! every field is six columns wide: a five-column mantissa with three significant digits, then a
//! one-column si prefix or unit suffix.


const LARGE_PREFIXES: [char; 9] = [' ', 'k', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];
const SMALL_PREFIXES: [char; 9] = [' ', 'm', 'u', 'n', 'p', 'f', 'a', 'z', 'y'];

/// duration units, with their length in seconds. the last entry only bounds the previous one.
const TIME_SUFFIXES: [(f64, char); 6] = [
    (1.0, 's'),
    (60.0, 'm'),
    (3600.0, 'h'),
    (86400.0, 'd'),
    (86400.0 * 365.25, 'y'),
    (86400.0 * 365.25 * 10.0, ' '),
];

/// an estimate that cannot be made.
pub const UNKNOWN: &str = "   -  ";

/// formats a quantity with an si prefix, e.g. `" 23.7k"`.
///
/// magnitudes beyond the largest prefix render as `"+infty"` or `"-infty"`; magnitudes below the
/// smallest one as a signed zero.
pub fn numeric_field(value: f64) -> String {
    let mut value = value;
    let mut prefix = 0;

    if value.abs() >= 1.0 {
        while value.abs() >= 1000.0 && prefix < LARGE_PREFIXES.len() {
            value /= 1000.0;
            prefix += 1;
        }
        match LARGE_PREFIXES.get(prefix) {
            Some(p) => mantissa(value, *p),
            None if value > 0.0 => "+infty".to_owned(),
            None => "-infty".to_owned(),
        }
    } else {
        while value.abs() < 1.0 && prefix < SMALL_PREFIXES.len() {
            value *= 1000.0;
            prefix += 1;
        }
        match SMALL_PREFIXES.get(prefix) {
            Some(p) => mantissa(value, *p),
            None if value.is_sign_negative() => "   -0 ".to_owned(),
            None => "    0 ".to_owned(),
        }
    }
}

/// formats a duration with the largest unit it reaches, e.g. `" 2.08m"`.
pub fn seconds(secs: f64) -> String {
    if secs.is_nan() || secs < 1.0 {
        return "  < 1s".to_owned();
    }

    TIME_SUFFIXES
        .windows(2)
        .find(|pair| secs < pair[1].0)
        .map(|pair| {
            let (unit, suffix) = pair[0];
            mantissa(secs / unit, suffix)
        })
        .unwrap_or_else(|| " > 10y".to_owned())
}

/// estimates the time left before reaching either end of a file at `speed` bytes per second.
///
/// reading forward runs until the end of the file, reading backward until its start. no estimate
/// is made for writers or stalled readers.
pub fn eta(writable: bool, size: i64, offset: i64, speed: f64) -> String {
    if writable || speed == 0.0 {
        return UNKNOWN.to_owned();
    }

    if speed > 0.0 {
        seconds((size - offset) as f64 / speed)
    } else {
        seconds(offset as f64 / -speed)
    }
}

/// fits `s` into exactly `width` characters.
///
/// shorter strings are padded with spaces. longer ones keep their tail, behind an ellipsis.
pub fn shorten(s: &str, width: usize) -> String {
    const ELLIPSIS: &str = "...";

    let len = s.chars().count();
    if len <= width {
        return format!("{s:<width$}");
    }

    let Some(keep) = width.checked_sub(ELLIPSIS.len()) else {
        return ELLIPSIS[..width].to_owned();
    };
    let tail = s.chars().skip(len - keep).collect::<String>();
    format!("{ELLIPSIS}{tail}")
}

/// renders `value`, whose magnitude is in `[1, 1000)`, as `printf("% 5.3g%c")` would.
fn mantissa(value: f64, suffix: char) -> String {
    let value = value.clamp(-999.0, 999.0);
    let magnitude = value.abs();
    let decimals = if magnitude >= 99.95 {
        0
    } else if magnitude >= 9.995 {
        1
    } else {
        2
    };

    let mut digits = format!("{value:.decimals$}");
    if digits.contains('.') {
        let trimmed = digits.trim_end_matches('0').trim_end_matches('.').len();
        digits.truncate(trimmed);
    }
    if !digits.starts_with('-') {
        digits.insert(0, ' ');
    }

    format!("{digits:>5}{suffix}")
}
