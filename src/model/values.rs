use serde::{Deserialize, Serialize};

/// Affine matrix in SVG column order `[a c e; b d f; 0 0 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translation(tx: f64, ty: f64) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Matrix {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// `self * other`, i.e. `other` is applied first.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn inverse(&self) -> Option<Matrix> {
        let det = self.a * self.d - self.b * self.c;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Matrix {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Parse an SVG `transform` attribute. Only `matrix`, `translate` and
    /// `scale` are understood; anything else yields `None`.
    pub fn parse_transform_list(source: &str) -> Option<Matrix> {
        let mut result = Matrix::IDENTITY;
        let mut rest = source.trim();
        while !rest.is_empty() {
            let open = rest.find('(')?;
            let close = rest.find(')')?;
            if close < open {
                return None;
            }
            let name = rest[..open].trim().trim_start_matches(',').trim();
            let args = parse_number_list(&rest[open + 1..close])?;
            let step = match (name, args.as_slice()) {
                ("matrix", [a, b, c, d, e, f]) => Matrix {
                    a: *a,
                    b: *b,
                    c: *c,
                    d: *d,
                    e: *e,
                    f: *f,
                },
                ("translate", [tx]) => Matrix::translation(*tx, 0.0),
                ("translate", [tx, ty]) => Matrix::translation(*tx, *ty),
                ("scale", [s]) => Matrix::scaling(*s, *s),
                ("scale", [sx, sy]) => Matrix::scaling(*sx, *sy),
                _ => return None,
            };
            result = result.multiply(&step);
            rest = rest[close + 1..].trim_start_matches([',', ' ', '\t', '\n']);
        }
        Some(result)
    }
}

fn parse_number_list(source: &str) -> Option<Vec<f64>> {
    source
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RectValue {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectValue {
    pub fn union(&self, other: &RectValue) -> RectValue {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        RectValue {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

/// SVG length units with their `SVGLength.unitType` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthUnit {
    Unknown,
    Number,
    Percentage,
    Ems,
    Exs,
    Px,
    Cm,
    Mm,
    In,
    Pt,
    Pc,
}

impl LengthUnit {
    pub fn code(self) -> u16 {
        match self {
            LengthUnit::Unknown => 0,
            LengthUnit::Number => 1,
            LengthUnit::Percentage => 2,
            LengthUnit::Ems => 3,
            LengthUnit::Exs => 4,
            LengthUnit::Px => 5,
            LengthUnit::Cm => 6,
            LengthUnit::Mm => 7,
            LengthUnit::In => 8,
            LengthUnit::Pt => 9,
            LengthUnit::Pc => 10,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let unit = match code {
            1 => LengthUnit::Number,
            2 => LengthUnit::Percentage,
            3 => LengthUnit::Ems,
            4 => LengthUnit::Exs,
            5 => LengthUnit::Px,
            6 => LengthUnit::Cm,
            7 => LengthUnit::Mm,
            8 => LengthUnit::In,
            9 => LengthUnit::Pt,
            10 => LengthUnit::Pc,
            _ => return None,
        };
        Some(unit)
    }

    fn suffix(self) -> &'static str {
        match self {
            LengthUnit::Unknown | LengthUnit::Number => "",
            LengthUnit::Percentage => "%",
            LengthUnit::Ems => "em",
            LengthUnit::Exs => "ex",
            LengthUnit::Px => "px",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
            LengthUnit::In => "in",
            LengthUnit::Pt => "pt",
            LengthUnit::Pc => "pc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    pub fn parse(source: &str) -> Option<Length> {
        let trimmed = source.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic() || c == '%')
            .unwrap_or(trimmed.len());
        let (number, suffix) = trimmed.split_at(split);
        let value = number.trim().parse::<f64>().ok()?;
        let unit = match suffix.to_ascii_lowercase().as_str() {
            "" => LengthUnit::Number,
            "%" => LengthUnit::Percentage,
            "em" => LengthUnit::Ems,
            "ex" => LengthUnit::Exs,
            "px" => LengthUnit::Px,
            "cm" => LengthUnit::Cm,
            "mm" => LengthUnit::Mm,
            "in" => LengthUnit::In,
            "pt" => LengthUnit::Pt,
            "pc" => LengthUnit::Pc,
            _ => return None,
        };
        Some(Length { value, unit })
    }
}

impl std::fmt::Display for Length {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// Split an inline `style` attribute into ordered declarations.
pub fn parse_declarations(source: &str) -> Vec<(String, String)> {
    source
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim().to_string()))
        })
        .collect()
}

pub fn format_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}
