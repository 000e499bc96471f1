//! Named output catalog.
//!
//! Requested quantities are given by name, parsed once, and turned into
//! labelled extractor closures that run against every [`PointResult`] of a
//! sweep. Unknown or malformed names are rejected when the list is built,
//! before any numerical work.
//!
//! | Name | Meaning |
//! |------|---------|
//! | `s{ij}{mag,db,ang,re,im}(row,col)` | GSM entry view, e.g. `s21db(h,h)` |
//! | `ar{ij}db(pol)` | axial ratio of the wave in port `i` for input `pol` at port `j` |
//! | `ddb{ij}(a,b)` | differential insertion loss (dB) |
//! | `dang{ij}(a,b)` | differential insertion phase (degrees) |
//! | `FGHz`, `FMHz` | frequency |
//! | `theta`, `phi` | scan angles in region 1 (degrees) |
//! | `psi1`, `psi2` | inter-element phase shifts (degrees) |
//!
//! Mode arguments are 1-based raw indices (`1` is the dominant TE mode),
//! `te`, `tm`, or the polarisation tags `h`, `v`, `r`, `l`.

use crate::extract::{self, ExtractError, ModeAddr, Quantity};
use crate::types::PointResult;

type Extractor = Box<dyn Fn(&PointResult) -> Result<f64, ExtractError> + Send + Sync>;

/// A labelled extractor.
pub struct Output {
    pub label: String,
    extractor: Extractor,
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output").field("label", &self.label).finish()
    }
}

impl Output {
    pub fn evaluate(&self, result: &PointResult) -> Result<f64, ExtractError> {
        (self.extractor)(result)
    }
}

/// Short descriptions of every output family, for help text.
pub fn catalog() -> &'static [(&'static str, &'static str)] {
    &[
        ("s{ij}mag(row,col)", "magnitude of S_ij"),
        ("s{ij}db(row,col)", "20 log10 |S_ij|"),
        ("s{ij}ang(row,col)", "phase of S_ij (degrees)"),
        ("s{ij}re(row,col)", "real part of S_ij"),
        ("s{ij}im(row,col)", "imaginary part of S_ij"),
        ("ar{ij}db(pol)", "axial ratio (dB) in port i for input polarisation pol at port j"),
        ("ddb{ij}(a,b)", "differential insertion loss S_ij(a,a) vs S_ij(b,b) (dB)"),
        ("dang{ij}(a,b)", "differential insertion phase S_ij(a,a) vs S_ij(b,b) (degrees)"),
        ("FGHz", "frequency (GHz)"),
        ("FMHz", "frequency (MHz)"),
        ("theta", "elevation in region 1 (degrees)"),
        ("phi", "azimuth (degrees)"),
        ("psi1", "phase shift along s1 (degrees)"),
        ("psi2", "phase shift along s2 (degrees)"),
    ]
}

fn malformed(name: &str, reason: impl Into<String>) -> ExtractError {
    ExtractError::Malformed {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn parse_mode(name: &str, arg: &str) -> Result<ModeAddr, ExtractError> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "te" => Ok(ModeAddr::TE),
        "tm" => Ok(ModeAddr::TM),
        "h" => Ok(ModeAddr::H),
        "v" => Ok(ModeAddr::V),
        "r" => Ok(ModeAddr::R),
        "l" => Ok(ModeAddr::L),
        other => match other.parse::<usize>() {
            Ok(k) if k >= 1 => Ok(ModeAddr::Raw(k - 1)),
            _ => Err(malformed(name, format!("bad mode argument '{arg}'"))),
        },
    }
}

/// Split `head(args)` into `head` and its comma-separated arguments.
fn split_call<'a>(name: &str, text: &'a str) -> Result<(&'a str, Vec<&'a str>), ExtractError> {
    match text.find('(') {
        None => Ok((text, Vec::new())),
        Some(open) => {
            let inner = text[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| malformed(name, "missing closing parenthesis"))?;
            Ok((&text[..open], inner.split(',').collect()))
        }
    }
}

/// Parse a two-digit port pair such as `21`.
fn parse_ports(name: &str, digits: &str) -> Result<(usize, usize), ExtractError> {
    let mut chars = digits.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), None) => {
            let port = |c: char| match c {
                '1' => Ok(1),
                '2' => Ok(2),
                _ => Err(malformed(name, format!("port '{c}' must be 1 or 2"))),
            };
            Ok((port(a)?, port(b)?))
        }
        _ => Err(malformed(name, format!("expected two port digits, found '{digits}'"))),
    }
}

fn expect_args(name: &str, args: &[&str], count: usize) -> Result<(), ExtractError> {
    if args.len() != count {
        return Err(malformed(
            name,
            format!("expected {count} argument(s), found {}", args.len()),
        ));
    }
    Ok(())
}

/// Parse one output name into a labelled extractor.
pub fn parse_output(name: &str) -> Result<Output, ExtractError> {
    let text: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    let (head, args) = split_call(name, &text)?;
    let label = text.clone();

    let simple = |f: fn(&PointResult) -> f64| -> Result<Output, ExtractError> {
        expect_args(name, &args, 0)?;
        Ok(Output {
            label: label.clone(),
            extractor: Box::new(move |r| Ok(f(r))),
        })
    };

    match head {
        "FGHz" => return simple(|r| r.frequency_hz * 1e-9),
        "FMHz" => return simple(|r| r.frequency_hz * 1e-6),
        "theta" => return simple(extract::theta_deg),
        "phi" => return simple(extract::phi_deg),
        "psi1" => return simple(|r| extract::phase_shifts_deg(r)[0]),
        "psi2" => return simple(|r| extract::phase_shifts_deg(r)[1]),
        _ => {}
    }

    let lower = head.to_ascii_lowercase();
    let extractor: Extractor = if let Some(rest) = lower.strip_prefix("dang") {
        let (i, j) = parse_ports(name, rest)?;
        expect_args(name, &args, 2)?;
        let (a, b) = (parse_mode(name, args[0])?, parse_mode(name, args[1])?);
        Box::new(move |r| extract::differential_phase(r, i, j, a, b))
    } else if let Some(rest) = lower.strip_prefix("ddb") {
        let (i, j) = parse_ports(name, rest)?;
        expect_args(name, &args, 2)?;
        let (a, b) = (parse_mode(name, args[0])?, parse_mode(name, args[1])?);
        Box::new(move |r| extract::differential_db(r, i, j, a, b))
    } else if let Some(rest) = lower.strip_prefix("ar") {
        let ports = rest
            .strip_suffix("db")
            .ok_or_else(|| malformed(name, "axial ratio is only available in dB"))?;
        let (i, j) = parse_ports(name, ports)?;
        expect_args(name, &args, 1)?;
        let pol = parse_mode(name, args[0])?;
        Box::new(move |r| extract::axial_ratio_db(r, i, j, pol))
    } else if let Some(rest) = lower.strip_prefix('s') {
        if rest.len() < 3 || !rest.is_char_boundary(2) {
            return Err(ExtractError::UnknownOutput(name.to_string()));
        }
        let (i, j) = parse_ports(name, &rest[..2])?;
        let q = match &rest[2..] {
            "mag" => Quantity::Magnitude,
            "db" => Quantity::Db,
            "ang" => Quantity::Phase,
            "re" => Quantity::Re,
            "im" => Quantity::Im,
            other => return Err(malformed(name, format!("unknown quantity '{other}'"))),
        };
        expect_args(name, &args, 2)?;
        let (row, col) = (parse_mode(name, args[0])?, parse_mode(name, args[1])?);
        Box::new(move |r| extract::quantity(r, i, j, row, col, q))
    } else {
        return Err(ExtractError::UnknownOutput(name.to_string()));
    };

    Ok(Output { label, extractor })
}

/// Collects output requests, validating each as it is added.
#[derive(Debug, Default)]
pub struct OutputBuilder {
    outputs: Vec<Output>,
}

impl OutputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str) -> Result<&mut Self, ExtractError> {
        self.outputs.push(parse_output(name)?);
        Ok(self)
    }

    pub fn build(self) -> Vec<Output> {
        self.outputs
    }
}

/// Parse a whole list of names, failing on the first bad one.
pub fn parse_outputs<S: AsRef<str>>(names: &[S]) -> Result<Vec<Output>, ExtractError> {
    let mut builder = OutputBuilder::new();
    for name in names {
        builder.add(name.as_ref())?;
    }
    Ok(builder.build())
}
