use serde::{Deserialize, Serialize};

/// Selects the unit a size or position is expressed in. Logical pixels are
/// physical pixels divided by the window's monitor scale factor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PixelsType {
    #[default]
    Logical,
    Physical,
}

#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize,
)]
pub struct ViewSize {
    pub width: usize,
    pub height: usize,
}

impl ViewSize {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn to_physical(self, scale_factor: f32) -> Self {
        Self {
            width: scale_up(self.width, scale_factor),
            height: scale_up(self.height, scale_factor),
        }
    }

    pub fn to_logical(self, scale_factor: f32) -> Self {
        Self {
            width: scale_down(self.width, scale_factor),
            height: scale_down(self.height, scale_factor),
        }
    }

    /// Converts a size given in `from` units into physical pixels.
    pub fn physical_from(self, from: PixelsType, scale_factor: f32) -> Self {
        match from {
            PixelsType::Logical => self.to_physical(scale_factor),
            PixelsType::Physical => self,
        }
    }

    /// Converts a physical size into the requested units.
    pub fn physical_into(self, into: PixelsType, scale_factor: f32) -> Self {
        match into {
            PixelsType::Logical => self.to_logical(scale_factor),
            PixelsType::Physical => self,
        }
    }
}

impl From<(usize, usize)> for ViewSize {
    fn from((width, height): (usize, usize)) -> Self {
        Self::new(width, height)
    }
}

/// Edges of a rectangle in screen coordinates.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize,
)]
pub struct ViewRect {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl ViewRect {
    pub const fn new(left: usize, top: usize, right: usize, bottom: usize) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> usize {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> usize {
        self.bottom.saturating_sub(self.top)
    }

    pub fn size(&self) -> ViewSize {
        ViewSize::new(self.width(), self.height())
    }

    pub fn physical_from(self, from: PixelsType, scale_factor: f32) -> Self {
        match from {
            PixelsType::Logical => self.map(|v| scale_up(v, scale_factor)),
            PixelsType::Physical => self,
        }
    }

    pub fn physical_into(self, into: PixelsType, scale_factor: f32) -> Self {
        match into {
            PixelsType::Logical => self.map(|v| scale_down(v, scale_factor)),
            PixelsType::Physical => self,
        }
    }

    fn map(self, f: impl Fn(usize) -> usize) -> Self {
        Self {
            left: f(self.left),
            top: f(self.top),
            right: f(self.right),
            bottom: f(self.bottom),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

fn valid_scale(scale_factor: f32) -> f32 {
    if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    }
}

fn scale_up(value: usize, scale_factor: f32) -> usize {
    (value as f64 * valid_scale(scale_factor) as f64).round() as usize
}

fn scale_down(value: usize, scale_factor: f32) -> usize {
    (value as f64 / valid_scale(scale_factor) as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_size_round_trips_through_fractional_scale() {
        let logical = ViewSize::new(600, 600);
        let physical = logical.physical_from(PixelsType::Logical, 1.5);
        assert_eq!(physical, ViewSize::new(900, 900));
        assert_eq!(physical.physical_into(PixelsType::Logical, 1.5), logical);
    }

    #[test]
    fn physical_units_pass_through_untouched() {
        let size = ViewSize::new(801, 333);
        assert_eq!(size.physical_from(PixelsType::Physical, 2.0), size);
        assert_eq!(size.physical_into(PixelsType::Physical, 2.0), size);
    }

    #[test]
    fn invalid_scale_factor_is_treated_as_identity() {
        let size = ViewSize::new(10, 20);
        assert_eq!(size.to_physical(0.0), size);
        assert_eq!(size.to_logical(f32::NAN), size);
    }

    #[test]
    fn rect_scales_every_edge() {
        let rect = ViewRect::new(200, 100, 500, 600);
        let physical = rect.physical_from(PixelsType::Logical, 2.0);
        assert_eq!(physical, ViewRect::new(400, 200, 1000, 1200));
        assert_eq!(physical.size(), ViewSize::new(600, 1000));
        assert_eq!(physical.physical_into(PixelsType::Logical, 2.0), rect);
    }
}
